//! Structured error handling with codes, context and recovery suggestions
//!
//! Network and payload failures are reported by the API client's own error
//! type. This one covers configuration, IO and validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ErrorCode {
    // IO errors (2xxx)
    IoError = 2000,
    FileNotFound = 2001,
    PermissionDenied = 2002,

    // Configuration errors (3xxx)
    ConfigNotFound = 3001,
    ConfigParseError = 3002,
    InvalidConfigValue = 3004,

    // Validation errors (6xxx)
    ValidationError = 6000,
    InvalidCoordinate = 6002,
}

impl ErrorCode {
    /// Get the numeric code
    #[must_use]
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            2 => "IO",
            3 => "Configuration",
            6 => "Validation",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {ctx}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Add context to the error
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.code.code() / 1000 {
            3 => exit_codes::CONFIG_ERROR,
            6 => exit_codes::VALIDATION_ERROR,
            _ => exit_codes::FAILURE,
        }
    }

    // Convenience constructors

    /// Configuration file missing at an explicit path
    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create fleetmap.toml or pass --config with an existing path")
    }

    /// Configuration parsed but holds an unusable value
    pub fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfigValue,
            format!("Invalid value for {field}: {}", message.into()),
        )
    }

    /// Value failed validation
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for CLI commands
#[allow(missing_docs)]
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const VALIDATION_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const NETWORK_ERROR: i32 = 4;
    pub const PARSE_ERROR: i32 = 5;
    pub const TIMEOUT: i32 = 124;
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {err}")).with_source(err)
    }
}

impl From<fleetmap_geo::GeoError> for Error {
    fn from(err: fleetmap_geo::GeoError) -> Self {
        let code = match err.code() {
            fleetmap_geo::GeoErrorCode::InvalidCoordinate => ErrorCode::InvalidCoordinate,
            fleetmap_geo::GeoErrorCode::RouteTooShort => ErrorCode::InvalidConfigValue,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Attach context to the error, if any
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::FileNotFound.to_string(), "E2001");
        assert_eq!(ErrorCode::InvalidConfigValue.to_string(), "E3004");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::IoError.category(), "IO");
        assert_eq!(ErrorCode::ConfigNotFound.category(), "Configuration");
        assert_eq!(ErrorCode::InvalidCoordinate.category(), "Validation");
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::config_not_found("/etc/fleetmap.toml").with_context("While starting watch");

        assert_eq!(err.code, ErrorCode::ConfigNotFound);
        assert!(err.context.is_some());
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::invalid_config("polling.base_interval_ms", "must be greater than zero")
            .with_context("Validating fleetmap.toml");
        let text = err.to_string();

        assert!(text.starts_with("[E3004]"));
        assert!(text.contains("Context: Validating fleetmap.toml"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::config_not_found("x.toml").exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(Error::validation("bad").exit_code(), exit_codes::VALIDATION_ERROR);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(Error::from(io).exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn test_geo_error_conversion() {
        let err: Error = fleetmap_geo::GeoError::RouteTooShort(1).into();
        assert_eq!(err.code, ErrorCode::InvalidConfigValue);
    }
}
