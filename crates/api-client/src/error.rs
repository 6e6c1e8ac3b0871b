//! Error types for the API client

use fleetmap_core::error::exit_codes;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure: connect, reset, body read
    #[error("Network error: {message}")]
    Network {
        /// What went wrong
        message: String,
        /// Underlying HTTP client error, when there is one
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Backend answered with a non-success status
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, truncated
        message: String,
    },

    /// Request deadline exceeded
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Payload was not the expected shape
    #[error("Malformed payload: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Coarse failure classes reported by the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport failure or bad HTTP status
    Network,
    /// Deadline exceeded
    Timeout,
    /// Malformed payload
    Parse,
    /// Misconfiguration; will not fix itself
    Config,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::Config => "config",
        })
    }
}

impl ApiError {
    /// Network error without an underlying client error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a payload error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Classify a `reqwest` error; timeouts become [`ApiError::Timeout`]
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }

    /// Failure class
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::Status { .. } => FailureKind::Network,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Parse(_) => FailureKind::Parse,
            Self::Config(_) | Self::InvalidUrl(_) => FailureKind::Config,
        }
    }

    /// Process exit code for one-shot commands
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            FailureKind::Network => exit_codes::NETWORK_ERROR,
            FailureKind::Timeout => exit_codes::TIMEOUT,
            FailureKind::Parse => exit_codes::PARSE_ERROR,
            FailureKind::Config => exit_codes::CONFIG_ERROR,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
