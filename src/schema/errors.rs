//! # Schema Errors
//!
//! Failures while loading or validating a schema definition file. All of
//! them are raised before the first HTTP call.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema definition error types
#[derive(Debug)]
pub enum SchemaError {
    /// Definition file could not be read
    FileRead { path: PathBuf, source: io::Error },

    /// Definition file is not valid YAML/JSON for the schema model
    ParseError { path: PathBuf, message: String },

    /// File extension is neither yaml/yml nor json
    UnsupportedFormat { path: PathBuf },

    /// Definition parsed but is inconsistent
    Invalid { reason: String },
}

impl SchemaError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FileRead { .. } => "SCHEMA_READ_ERROR",
            Self::ParseError { .. } => "SCHEMA_PARSE_ERROR",
            Self::UnsupportedFormat { .. } => "SCHEMA_UNSUPPORTED_FORMAT",
            Self::Invalid { .. } => "SCHEMA_INVALID",
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileRead { path, source } => {
                write!(f, "Failed to read schema file {:?}: {}", path, source)
            }
            Self::ParseError { path, message } => {
                write!(f, "Failed to parse schema {:?}: {}", path, message)
            }
            Self::UnsupportedFormat { path } => {
                write!(
                    f,
                    "Unsupported schema format {:?}: expected .yaml, .yml or .json",
                    path
                )
            }
            Self::Invalid { reason } => write!(f, "Invalid schema: {}", reason),
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileRead { source, .. } => Some(source),
            _ => None,
        }
    }
}
