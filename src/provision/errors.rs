//! # Provisioning Errors
//!
//! Conditions that stop a run. Per-item failures are not errors at this
//! level; they are journal records.

use thiserror::Error;

use crate::cms::CmsError;
use crate::schema::SchemaError;

/// Result type for provisioning runs
pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Login failed or the token was rejected; nothing was provisioned
    #[error("Authentication against the CMS failed: {0}")]
    Auth(#[source] CmsError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The CMS client could not be constructed
    #[error("CMS client setup failed: {0}")]
    Client(#[source] CmsError),
}

impl ProvisionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_FAILED",
            Self::Schema(e) => e.error_code(),
            Self::Client(_) => "CLIENT_SETUP_FAILED",
        }
    }
}
