//! Tracked devices and their position fixes

use chrono::{DateTime, Utc};
use fleetmap_geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque device identifier as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a backend identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A tracked device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Backend identifier
    pub id: DeviceId,
    /// Label shown on the map
    pub name: String,
}

impl Device {
    /// Create a named device
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Device labelled with its own identifier
    #[must_use]
    pub fn unnamed(id: DeviceId) -> Self {
        let name = id.as_str().to_string();
        Self { id, name }
    }
}

/// One position fix. Never mutated; a newer fix supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Reporting device
    pub device_id: DeviceId,
    /// Where the device was
    pub coordinate: Coordinate,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
    /// Accuracy radius in meters
    pub accuracy_m: f64,
}

impl Position {
    /// Create a fix
    pub fn new(
        device_id: impl Into<DeviceId>,
        coordinate: Coordinate,
        timestamp: DateTime<Utc>,
        accuracy_m: f64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            coordinate,
            timestamp,
            accuracy_m,
        }
    }

    /// Whether this fix is strictly newer than `other`
    #[must_use]
    pub fn is_newer_than(&self, other: &Position) -> bool {
        self.timestamp > other.timestamp
    }

    /// Age of the fix at `now`; zero for fixes stamped in the future
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.timestamp).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_device_id_roundtrips_as_plain_string() {
        let id = DeviceId::new("bus-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bus-1\"");
        assert_eq!(id.to_string(), "bus-1");
    }

    #[test]
    fn test_unnamed_device_uses_id() {
        let device = Device::unnamed(DeviceId::new("tracker-7"));
        assert_eq!(device.name, "tracker-7");
    }

    #[test]
    fn test_is_newer_than_is_strict() {
        let a = Position::new("bus-1", Coordinate::new(0.0, 0.0), at(10), 5.0);
        let b = Position::new("bus-1", Coordinate::new(1.0, 1.0), at(10), 5.0);
        let c = Position::new("bus-1", Coordinate::new(1.0, 1.0), at(11), 5.0);
        assert!(!b.is_newer_than(&a));
        assert!(c.is_newer_than(&a));
    }

    #[test]
    fn test_age_at() {
        let fix = Position::new("bus-1", Coordinate::new(0.0, 0.0), at(100), 0.0);
        assert_eq!(fix.age_at(at(130)), std::time::Duration::from_secs(30));
        assert_eq!(fix.age_at(at(90)), std::time::Duration::ZERO);
    }
}
