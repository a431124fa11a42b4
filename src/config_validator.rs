//! Configuration Validation
//!
//! Validates provisioning configuration before any request is made.
//! All problems are collected and reported together.

/// A single rejected configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of config validation
pub type ValidationResult<T> = Result<T, Vec<ConfigValidationError>>;

/// Accumulating validator
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn error(&mut self, field: &str, value: impl std::fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    /// Record a failed rule that the helpers below do not cover
    pub fn reject(&mut self, field: &str, value: impl std::fmt::Display, message: &str) -> &mut Self {
        self.error(field, value, message);
        self
    }

    /// Validate positive integer
    pub fn validate_positive(&mut self, field: &str, value: i64) -> &mut Self {
        if value <= 0 {
            self.error(field, value, "Value must be positive");
        }
        self
    }

    /// Validate port number (1-65535)
    pub fn validate_port(&mut self, field: &str, port: u16) -> &mut Self {
        if port == 0 {
            self.error(field, port, "Port must be between 1 and 65535");
        }
        self
    }

    /// Validate non-empty string. The value itself is never echoed.
    pub fn validate_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, "<empty>", "Value cannot be empty");
        }
        self
    }

    /// Validate URL format
    pub fn validate_url(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, "<empty>", "URL is required");
        } else if !value.starts_with("http://") && !value.starts_with("https://") {
            self.error(field, value, "URL must start with http:// or https://");
        }
        self
    }

    /// Finish validation and return result
    pub fn finish(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Format validation errors for display
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
