//! Configuration for the telemetry client

use crate::error::{ApiError, ApiResult};
use fleetmap_core::config::BackendConfig;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the IoT backend
    pub base_url: String,
    /// Base URL of the drop-off prediction service
    pub prediction_url: String,
    /// Deadline for one request, connect included
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_backend(&BackendConfig::default())
    }
}

impl From<&BackendConfig> for ClientConfig {
    fn from(backend: &BackendConfig) -> Self {
        Self::from_backend(backend)
    }
}

impl ClientConfig {
    /// Build from the `[backend]` section of the application config
    #[must_use]
    pub fn from_backend(backend: &BackendConfig) -> Self {
        Self {
            base_url: backend.base_url.clone(),
            prediction_url: backend.prediction_url.clone(),
            timeout: backend.timeout(),
            user_agent: format!("fleetmap/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set the prediction service URL
    #[must_use]
    pub fn with_prediction_url(mut self, url: impl Into<String>) -> Self {
        self.prediction_url = url.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        for (name, url) in [("base_url", &self.base_url), ("prediction_url", &self.prediction_url)] {
            if url.is_empty() {
                return Err(ApiError::config(format!("{name} cannot be empty")));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ApiError::config(format!(
                    "{name} must start with http:// or https://"
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(ApiError::config("timeout cannot be zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8001");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("fleetmap/"));
    }

    #[test]
    fn test_from_backend() {
        let backend = BackendConfig {
            base_url: "https://iot.example.org".into(),
            prediction_url: "https://predict.example.org".into(),
            timeout_ms: 1500,
        };
        let config = ClientConfig::from(&backend);
        assert_eq!(config.prediction_url, "https://predict.example.org");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::default()
            .with_base_url("http://192.168.0.230:8001")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.base_url, "http://192.168.0.230:8001");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validation() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ClientConfig::default().with_base_url("").validate().is_err());
        assert!(ClientConfig::default().with_prediction_url("tcp://x").validate().is_err());
        assert!(ClientConfig::default()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
