//! Configuration schema definitions
//!
//! Durations are stored as integer milliseconds so the TOML stays readable.

use crate::backoff::BackoffConfig;
use crate::error::{Error, Result};
use crate::model::Device;
use fleetmap_geo::{Route, Stop, DEFAULT_ARRIVAL_RADIUS_M};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigSchema {
    /// IoT backend endpoints
    #[serde(default)]
    pub backend: BackendConfig,

    /// Poll cadence and backoff
    #[serde(default)]
    pub polling: PollingConfig,

    /// Position store behaviour
    #[serde(default)]
    pub store: StoreConfig,

    /// Map rendering settings
    #[serde(default)]
    pub map: MapConfig,

    /// Stops of the followed route
    #[serde(default)]
    pub route: RouteConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL serving `/devices/positions` and `/bus/current_people`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the drop-off prediction service
    #[serde(default = "default_prediction_url")]
    pub prediction_url: String,

    /// Deadline for one request
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            prediction_url: default_prediction_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl BackendConfig {
    /// Request deadline
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_prediction_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Polling cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    /// Interval between polls while healthy
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,

    /// Cap for the backed-off interval
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: default_base_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

impl PollingConfig {
    /// Backoff policy for the scheduler
    #[must_use]
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig::new(
            Duration::from_millis(self.base_interval_ms),
            Duration::from_millis(self.max_interval_ms),
        )
    }
}

fn default_base_interval_ms() -> u64 {
    1_000
}

fn default_max_interval_ms() -> u64 {
    60_000
}

/// Position store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Fixes older than this are shown as stale
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl StoreConfig {
    /// Staleness threshold
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

fn default_stale_after_ms() -> u64 {
    30_000
}

/// Map settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapConfig {
    /// Maps API key. Keep it in `fleetmap.local.toml` or `FLEETMAP_MAPS_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Device whose fixes drive route progression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_device: Option<String>,

    /// Distance under which the followed device counts as arrived at a stop
    #[serde(default = "default_arrival_radius_m")]
    pub arrival_radius_m: f64,

    /// Marker labels keyed by device id; unlisted devices show their id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            follow_device: None,
            arrival_radius_m: default_arrival_radius_m(),
            labels: BTreeMap::new(),
        }
    }
}

impl MapConfig {
    /// Devices with configured labels
    pub fn labelled_devices(&self) -> impl Iterator<Item = Device> + '_ {
        self.labels
            .iter()
            .map(|(id, name)| Device::new(id.as_str(), name.as_str()))
    }
}

fn default_arrival_radius_m() -> f64 {
    DEFAULT_ARRIVAL_RADIUS_M
}

/// Route stops, in driving order
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RouteConfig {
    /// Stops; an empty list disables route following
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl RouteConfig {
    /// Build the route, or `None` when no stops are configured
    pub fn build(&self, arrival_radius_m: f64) -> Result<Option<Route>> {
        if self.stops.is_empty() {
            return Ok(None);
        }
        let route = Route::new(self.stops.clone())
            .map_err(Error::from)?
            .with_arrival_radius(arrival_radius_m);
        Ok(Some(route))
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,

    /// Also write daily-rotated log files here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let schema = ConfigSchema::default();
        assert_eq!(schema.backend.timeout(), Duration::from_secs(10));
        assert_eq!(schema.polling.backoff().base_interval, Duration::from_secs(1));
        assert_eq!(schema.polling.backoff().max_interval, Duration::from_secs(60));
        assert_eq!(schema.store.stale_after(), Duration::from_secs(30));
        assert!((schema.map.arrival_radius_m - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let schema: ConfigSchema = toml::from_str(
            r#"
            [polling]
            base_interval_ms = 2000

            [[route.stops]]
            name = "Back Gate"
            latitude = 36.772679
            longitude = 126.933898

            [[route.stops]]
            name = "Dorm 3"
            latitude = 36.768231
            longitude = 126.935381
            "#,
        )
        .unwrap();

        assert_eq!(schema.polling.base_interval_ms, 2000);
        assert_eq!(schema.polling.max_interval_ms, 60_000);
        assert_eq!(schema.backend, BackendConfig::default());
        let route = schema.route.build(30.0).unwrap().unwrap();
        assert_eq!(route.stops().len(), 2);
        assert!((route.arrival_radius_m() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_polling_backoff_doubles_exactly() {
        let schema: ConfigSchema = toml::from_str(
            r#"
            [polling]
            base_interval_ms = 1000
            max_interval_ms = 60000
            "#,
        )
        .unwrap();
        let backoff = schema.polling.backoff();
        let waits: Vec<Duration> = (1..=4).map(|n| backoff.interval_after(n)).collect();
        assert_eq!(
            waits,
            [2_000, 4_000, 8_000, 16_000].map(Duration::from_millis)
        );
    }

    #[test]
    fn test_labels() {
        let schema: ConfigSchema = toml::from_str(
            r#"
            [map.labels]
            bus-1 = "Campus Shuttle"
            "#,
        )
        .unwrap();
        let devices: Vec<Device> = schema.map.labelled_devices().collect();
        assert_eq!(devices, vec![Device::new("bus-1", "Campus Shuttle")]);
    }

    #[test]
    fn test_empty_route_is_none() {
        assert!(RouteConfig::default().build(25.0).unwrap().is_none());
    }
}
