//! # CMS Client
//!
//! Authenticated wrapper over a `CmsTransport`. One client lives for one
//! provisioning run; the token is obtained once and attached to every call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::errors::{CmsError, CmsResult};
use super::transport::{CmsRequest, CmsTransport, Method};

/// How the client obtains its bearer token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Pre-issued static token
    Token { token: String },
    /// Email/password exchanged via `POST /auth/login`
    Password { email: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token { .. } => f.debug_struct("Token").field("token", &"<redacted>").finish(),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Authenticated CMS client
#[derive(Debug)]
pub struct CmsClient<T> {
    transport: T,
    token: Option<String>,
}

impl<T: CmsTransport> CmsClient<T> {
    /// Create an unauthenticated client
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            token: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Obtain the bearer token for this run
    pub async fn authenticate(&mut self, credentials: &Credentials) -> CmsResult<()> {
        match credentials {
            Credentials::Token { token } => {
                if token.trim().is_empty() {
                    return Err(CmsError::AuthFailed("static token is empty".to_string()));
                }
                // Confirm the token before any stage runs
                let check = CmsRequest::new(Method::Get, "/collections")
                    .with_token(Some(token.clone()));
                self.transport.execute(check).await.map_err(|e| match e {
                    err @ CmsError::Http {
                        status: 401 | 403, ..
                    } => CmsError::AuthFailed(format!("static token rejected: {}", err)),
                    other => other,
                })?;
                debug!("Static CMS token accepted");
                self.token = Some(token.clone());
            }
            Credentials::Password { email, password } => {
                let request = CmsRequest::new(Method::Post, "/auth/login")
                    .with_body(json!({ "email": email, "password": password }));
                let response = self.transport.execute(request).await.map_err(|e| match e {
                    err @ CmsError::Http { .. } => CmsError::AuthFailed(err.to_string()),
                    other => other,
                })?;
                let token = response
                    .pointer("/data/access_token")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CmsError::AuthFailed("login response carried no access_token".to_string())
                    })?;
                info!(%email, "Logged in to CMS");
                self.token = Some(token.to_string());
            }
        }
        Ok(())
    }

    /// Issue a request and return the `data` envelope of the response
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> CmsResult<Value> {
        let token = self.token.clone().ok_or(CmsError::NotAuthenticated)?;
        let mut request = CmsRequest::new(method, path)
            .with_query(query)
            .with_token(Some(token));
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.transport.execute(request).await?;
        Ok(match response {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            other => other,
        })
    }

    pub async fn get(&self, path: &str, query: Vec<(String, String)>) -> CmsResult<Value> {
        self.request(Method::Get, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> CmsResult<Value> {
        self.request(Method::Post, path, Vec::new(), Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> CmsResult<Value> {
        self.request(Method::Patch, path, Vec::new(), Some(body)).await
    }
}
