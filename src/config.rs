//! # Provisioning Configuration
//!
//! Resolution order, last wins:
//!
//! 1. built-in defaults
//! 2. TOML file (`--config`)
//! 3. environment (`DIRECTUS_URL`, `DIRECTUS_ADMIN_TOKEN`, ...)
//! 4. command-line flags
//!
//! ```toml
//! url = "https://cms.example.com"
//! email = "admin@example.com"
//! password = "..."
//! request_timeout_secs = 30
//! schema = "schemas/hotel.yaml"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cms::Credentials;
use crate::config_validator::{format_validation_errors, ConfigValidationError, ConfigValidator};

pub const DEFAULT_CMS_URL: &str = "http://localhost:8055";

/// Environment variables read as overrides
pub mod env {
    pub const URL: &str = "DIRECTUS_URL";
    pub const PUBLIC_URL: &str = "NEXT_PUBLIC_DIRECTUS_URL";
    pub const ADMIN_TOKEN: &str = "DIRECTUS_ADMIN_TOKEN";
    pub const TOKEN: &str = "DIRECTUS_TOKEN";
    pub const ADMIN_EMAIL: &str = "DIRECTUS_ADMIN_EMAIL";
    pub const ADMIN_PASSWORD: &str = "DIRECTUS_ADMIN_PASSWORD";
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Invalid(Vec<ConfigValidationError>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "Failed to read config {}: {}", path.display(), source)
            }
            Self::Parse { path, message } => {
                write!(f, "Invalid config TOML in {}: {}", path.display(), message)
            }
            Self::Invalid(errors) => {
                write!(f, "Configuration rejected:\n{}", format_validation_errors(errors))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything one provisioning run needs to reach the CMS
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub url: String,
    /// Static token; takes precedence over email/password
    pub token: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout; none means no timeout
    pub request_timeout_secs: Option<u64>,
    /// Schema definition file; the bundled hotel schema when unset
    pub schema: Option<PathBuf>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CMS_URL.to_string(),
            token: None,
            email: None,
            password: None,
            request_timeout_secs: None,
            schema: None,
        }
    }
}

impl fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("schema", &self.schema)
            .finish()
    }
}

impl ProvisionConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// File (when given) overlaid with the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay environment values. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(env::URL).or_else(|| get(env::PUBLIC_URL)) {
            self.url = url;
        }
        if let Some(token) = get(env::ADMIN_TOKEN).or_else(|| get(env::TOKEN)) {
            self.token = Some(token);
        }
        if let Some(email) = get(env::ADMIN_EMAIL) {
            self.email = Some(email);
        }
        if let Some(password) = get(env::ADMIN_PASSWORD) {
            self.password = Some(password);
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.url = url;
        }
        self
    }

    pub fn with_schema(mut self, schema: Option<PathBuf>) -> Self {
        if schema.is_some() {
            self.schema = schema;
        }
        self
    }

    /// Reject anything that would make the run fail before its first stage
    pub fn validate(&self) -> ConfigResult<()> {
        let mut v = ConfigValidator::new();
        v.validate_url("url", &self.url);

        match (&self.token, &self.email, &self.password) {
            (Some(token), _, _) => {
                v.validate_non_empty("token", token);
            }
            (None, Some(email), Some(password)) => {
                v.validate_non_empty("email", email)
                    .validate_non_empty("password", password);
            }
            (None, Some(_), None) => {
                v.reject("password", "<unset>", "Password is required with email login");
            }
            (None, None, _) => {
                v.reject(
                    "token",
                    "<unset>",
                    "Set a static token or an admin email and password",
                );
            }
        }

        if let Some(secs) = self.request_timeout_secs {
            v.validate_positive(
                "request_timeout_secs",
                i64::try_from(secs).unwrap_or(i64::MAX),
            );
        }

        v.finish().map_err(ConfigError::Invalid)
    }

    /// Credentials to authenticate with
    pub fn credentials(&self) -> ConfigResult<Credentials> {
        self.validate()?;
        match (&self.token, &self.email, &self.password) {
            (Some(token), _, _) => Ok(Credentials::Token {
                token: token.clone(),
            }),
            (None, Some(email), Some(password)) => Ok(Credentials::Password {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => Err(ConfigError::Invalid(Vec::new())),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
