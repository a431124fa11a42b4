//! # CMS Transport
//!
//! The seam between the provisioning workflow and the wire. `HttpTransport`
//! talks to a live Directus instance through reqwest; `InMemoryCms` (see
//! `memory.rs`) stands in for tests and dry runs.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::errors::{CmsError, CmsResult};

/// HTTP verbs used against the CMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request against the CMS REST API
#[derive(Debug, Clone, PartialEq)]
pub struct CmsRequest {
    pub method: Method,
    /// Path below the base URL, always starting with `/`
    pub path: String,
    /// Query pairs, unencoded
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bearer token, when authenticated
    pub token: Option<String>,
}

impl CmsRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            token: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Path plus encoded query string, as sent on the wire
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// Trait for anything that can execute CMS requests
///
/// Implementations return the parsed JSON body of a 2xx response (or
/// `Value::Null` for an empty body) and map every other status to
/// `CmsError::Http`.
pub trait CmsTransport: Send + Sync {
    fn execute(&self, request: CmsRequest) -> impl Future<Output = CmsResult<Value>> + Send;
}

/// reqwest-backed transport for a live CMS
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the given base URL
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> CmsResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CmsError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CmsTransport for HttpTransport {
    async fn execute(&self, request: CmsRequest) -> CmsResult<Value> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        debug!(method = %request.method, %url, "CMS request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
        };
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CmsError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CmsError::Transport(e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else if status.is_success() {
            serde_json::from_str(&text).map_err(|e| CmsError::Decode(e.to_string()))?
        } else {
            // Error bodies are kept even when they are not JSON
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.is_success() {
            Ok(body)
        } else {
            Err(CmsError::http(status.as_u16(), body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query_encodes_filters() {
        let request = CmsRequest::new(Method::Get, "/items/hotels").with_query(vec![
            ("filter[slug][_eq]".to_string(), "ritz paris".to_string()),
            ("limit".to_string(), "1".to_string()),
        ]);
        assert_eq!(
            request.path_and_query(),
            "/items/hotels?filter%5Bslug%5D%5B_eq%5D=ritz%20paris&limit=1"
        );
    }

    #[test]
    fn test_path_without_query() {
        let request = CmsRequest::new(Method::Post, "/collections");
        assert_eq!(request.path_and_query(), "/collections");
    }

    #[test]
    fn test_http_transport_trims_base_url() {
        let transport = HttpTransport::new("http://localhost:8055/", None).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8055");
    }
}
