//! # CLI Errors
//!
//! Top-level failures. Every variant maps to exit code 1; a run that only
//! has per-item failures is not an error.

use std::fmt;

use crate::config::ConfigError;
use crate::provision::ProvisionError;
use crate::schema::SchemaError;
use crate::ui::BookingError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Schema(SchemaError),
    Provision(ProvisionError),
    InvalidInput { message: String },
    Io { context: String, source: std::io::Error },
}

impl CliError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_INVALID",
            Self::Schema(e) => e.error_code(),
            Self::Provision(e) => e.error_code(),
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Schema(e) => write!(f, "{}", e),
            Self::Provision(e) => write!(f, "{}", e),
            Self::InvalidInput { message } => write!(f, "{}", message),
            Self::Io { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Provision(e) => Some(e),
            Self::InvalidInput { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<ProvisionError> for CliError {
    fn from(e: ProvisionError) -> Self {
        Self::Provision(e)
    }
}

impl From<BookingError> for CliError {
    fn from(e: BookingError) -> Self {
        Self::invalid_input(e.to_string())
    }
}
