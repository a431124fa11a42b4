//! # CMS Errors
//!
//! Failures surfaced by the CMS client. Remote failures keep the HTTP status
//! and the payload the CMS returned so callers match on values, never on
//! message text.

use serde_json::Value;
use thiserror::Error;

/// Result type for CMS operations
pub type CmsResult<T> = Result<T, CmsError>;

/// CMS client errors
#[derive(Debug, Clone, Error)]
pub enum CmsError {
    /// Non-2xx response from the CMS
    #[error("CMS returned HTTP {status}: {}", remote_message(.payload))]
    Http { status: u16, payload: Value },

    /// Connection, DNS or TLS failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not the JSON we expected
    #[error("Failed to decode CMS response: {0}")]
    Decode(String),

    /// Login rejected or no access token in the login response
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A call was made before a token was available
    #[error("Client is not authenticated")]
    NotAuthenticated,
}

impl CmsError {
    /// Build an HTTP error from a status and raw payload
    pub fn http(status: u16, payload: Value) -> Self {
        Self::Http { status, payload }
    }

    /// HTTP status, when the CMS answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Remote error payload, when there is one
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Http { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Stable code for logs and reports
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Http { status: 400, .. } => "INVALID_PAYLOAD",
            Self::Http { status: 401, .. } => "UNAUTHORIZED",
            Self::Http { status: 403, .. } => "FORBIDDEN",
            Self::Http { status: 404, .. } => "NOT_FOUND",
            Self::Http { status: 409, .. } => "CONFLICT",
            Self::Http { .. } => "REMOTE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::AuthFailed(_) => "AUTH_FAILED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
        }
    }
}

/// Directus wraps failures as `{"errors": [{"message": ...}]}`.
fn remote_message(payload: &Value) -> String {
    payload
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

/// Build a Directus-shaped error payload
pub fn error_payload(code: &str, message: &str) -> Value {
    serde_json::json!({
        "errors": [{
            "message": message,
            "extensions": { "code": code }
        }]
    })
}
