//! # Diagnostic Endpoint
//!
//! `GET /api/debug` reports which CMS settings the site process can see.
//! Tokens are never returned whole: only a five character prefix.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Characters of a token that may be shown
pub const TOKEN_PREFIX_LEN: usize = 5;

pub const VARIABLES: [&str; 5] = [
    "NEXT_PUBLIC_DIRECTUS_URL",
    "DIRECTUS_PUBLIC_TOKEN",
    "DIRECTUS_ADMIN_TOKEN",
    "DIRECTUS_TOKEN",
    "IS_MOCK_SERVER",
];

/// Presence and prefix of one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReport {
    pub present: bool,
    pub preview: Option<String>,
}

impl TokenReport {
    fn from_value(value: Option<&str>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(token) => Self {
                present: true,
                preview: Some(truncate_token(token)),
            },
            None => Self {
                present: false,
                preview: None,
            },
        }
    }
}

/// Body of `GET /api/debug`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugReport {
    pub directus_url: Option<String>,
    pub public_token: TokenReport,
    pub admin_token: TokenReport,
    pub token: TokenReport,
    pub is_mock_server: bool,
}

/// Snapshot of the relevant environment, taken once at startup
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    pub directus_url: Option<String>,
    pub public_token: Option<String>,
    pub admin_token: Option<String>,
    pub token: Option<String>,
    pub is_mock_server: Option<String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            directus_url: lookup(VARIABLES[0]),
            public_token: lookup(VARIABLES[1]),
            admin_token: lookup(VARIABLES[2]),
            token: lookup(VARIABLES[3]),
            is_mock_server: lookup(VARIABLES[4]),
        }
    }

    pub fn report(&self) -> DebugReport {
        DebugReport {
            directus_url: self.directus_url.clone(),
            public_token: TokenReport::from_value(self.public_token.as_deref()),
            admin_token: TokenReport::from_value(self.admin_token.as_deref()),
            token: TokenReport::from_value(self.token.as_deref()),
            is_mock_server: self.is_mock_server.as_deref() == Some("true"),
        }
    }
}

/// First five characters followed by `...`
pub fn truncate_token(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

pub fn routes(snapshot: Arc<EnvSnapshot>) -> Router {
    Router::new()
        .route("/api/debug", get(debug))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(snapshot)
}

async fn debug(State(snapshot): State<Arc<EnvSnapshot>>) -> Json<DebugReport> {
    Json(snapshot.report())
}

/// Serve the diagnostic routes until the process is stopped
pub async fn serve(addr: SocketAddr, snapshot: EnvSnapshot) -> std::io::Result<()> {
    let app = routes(Arc::new(snapshot));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Diagnostic endpoint listening on /api/debug");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_truncate_token() {
        assert_eq!(truncate_token("abcdefghij"), "abcde...");
        assert_eq!(truncate_token("abc"), "abc...");
    }

    #[test]
    fn test_report_flags() {
        let snapshot = EnvSnapshot::from_lookup(|key| match key {
            "NEXT_PUBLIC_DIRECTUS_URL" => Some("https://cms.example.com".to_string()),
            "DIRECTUS_ADMIN_TOKEN" => Some("secret-admin-token".to_string()),
            "DIRECTUS_TOKEN" => Some(String::new()),
            "IS_MOCK_SERVER" => Some("true".to_string()),
            _ => None,
        });
        let report = snapshot.report();

        assert_eq!(report.directus_url.as_deref(), Some("https://cms.example.com"));
        assert!(report.admin_token.present);
        assert_eq!(report.admin_token.preview.as_deref(), Some("secre..."));
        assert!(!report.public_token.present);
        assert!(!report.token.present);
        assert!(report.is_mock_server);
    }

    #[tokio::test]
    async fn test_debug_route_never_leaks_full_token() {
        let snapshot = EnvSnapshot {
            public_token: Some("public-token-value".to_string()),
            ..EnvSnapshot::default()
        };
        let app = routes(Arc::new(snapshot));

        let request = Request::builder()
            .method("GET")
            .uri("/api/debug")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("public-token-value"));

        let report: DebugReport = serde_json::from_str(&text).unwrap();
        assert_eq!(report.public_token.preview.as_deref(), Some("publi..."));
        assert!(!report.is_mock_server);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = routes(Arc::new(EnvSnapshot::default()));
        let request = Request::builder()
            .uri("/api/other")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
