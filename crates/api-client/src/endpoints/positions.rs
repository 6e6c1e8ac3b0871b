//! Device position endpoint
//!
//! `GET <base>/devices/positions` returns the latest fix per device:
//!
//! ```json
//! [{"deviceId": "bus-1", "lat": 36.7726, "lon": 126.9338, "timestamp": 1718000000, "accuracy": 4.5}]
//! ```
//!
//! The list may also arrive wrapped as `{"positions": [...]}`. `timestamp` is
//! Unix epoch seconds (fractions allowed), epoch milliseconds (any magnitude
//! above 10^11) or an RFC 3339 string.

use crate::client::TelemetryClient;
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, TimeZone, Utc};
use fleetmap_core::{DeviceId, Position};
use fleetmap_geo::Coordinate;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Numbers above this are epoch milliseconds. 10^11 seconds is past the year 5000.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Path of the positions endpoint
pub const POSITIONS_PATH: &str = "devices/positions";

/// Positions API interface
#[derive(Clone)]
pub struct PositionsApi {
    client: TelemetryClient,
}

impl PositionsApi {
    /// Create a new positions API interface
    pub(crate) fn new(client: TelemetryClient) -> Self {
        Self { client }
    }

    /// Fetch and validate the latest fix of every device
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> ApiResult<Vec<Position>> {
        let url = self.client.url(POSITIONS_PATH);
        let body = self.client.get_bytes(&url, Option::<&()>::None).await?;
        parse_positions(&body)
    }

    /// Fetch with timing
    pub async fn fetch_timed(&self) -> ApiResult<(Vec<Position>, Duration)> {
        let start = std::time::Instant::now();
        let positions = self.fetch().await?;
        Ok((positions, start.elapsed()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PositionsPayload {
    List(Vec<WirePosition>),
    Wrapped { positions: Vec<WirePosition> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePosition {
    device_id: String,
    lat: f64,
    lon: f64,
    timestamp: WireTimestamp,
    #[serde(default)]
    accuracy: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Epoch(f64),
    Rfc3339(String),
}

impl WireTimestamp {
    fn to_utc(&self) -> Result<DateTime<Utc>, String> {
        match self {
            Self::Epoch(value) => {
                let millis = if value.abs() > EPOCH_MILLIS_THRESHOLD {
                    value.round()
                } else {
                    (value * 1000.0).round()
                };
                if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
                    return Err(format!("timestamp {value} is not representable"));
                }
                #[allow(clippy::cast_possible_truncation)]
                Utc.timestamp_millis_opt(millis as i64)
                    .single()
                    .ok_or_else(|| format!("timestamp {value} is out of range"))
            }
            Self::Rfc3339(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("timestamp '{text}': {e}")),
        }
    }
}

impl WirePosition {
    fn into_position(self, index: usize) -> ApiResult<Position> {
        let fail = |what: String| ApiError::parse(format!("positions[{index}]: {what}"));

        if self.device_id.trim().is_empty() {
            return Err(fail("empty deviceId".to_string()));
        }
        let coordinate =
            Coordinate::checked(self.lat, self.lon).map_err(|e| fail(e.to_string()))?;
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(fail(format!("accuracy {} is not a non-negative number", self.accuracy)));
        }
        let timestamp = self.timestamp.to_utc().map_err(fail)?;

        Ok(Position::new(
            DeviceId::new(self.device_id),
            coordinate,
            timestamp,
            self.accuracy,
        ))
    }
}

/// Decode and validate a positions payload. Any bad entry fails the whole payload.
pub fn parse_positions(body: &[u8]) -> ApiResult<Vec<Position>> {
    let payload: PositionsPayload = serde_json::from_slice(body)?;
    let wire = match payload {
        PositionsPayload::List(list) | PositionsPayload::Wrapped { positions: list } => list,
    };

    wire.into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_position(index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_parse_list() {
        let body = br#"[
            {"deviceId": "bus-1", "lat": 36.772503, "lon": 126.934089, "timestamp": 1718000000, "accuracy": 4.5},
            {"deviceId": "bus-2", "lat": 36.768231, "lon": 126.935381, "timestamp": "2024-06-10T06:13:20Z"}
        ]"#;

        let positions = parse_positions(body).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].device_id.as_str(), "bus-1");
        assert_eq!(positions[0].timestamp.timestamp(), 1_718_000_000);
        assert!((positions[0].accuracy_m - 4.5).abs() < f64::EPSILON);
        assert_eq!(positions[1].timestamp.timestamp(), 1_718_000_000);
        assert_eq!(positions[1].accuracy_m, 0.0);
    }

    #[test]
    fn test_parse_wrapped() {
        let body = br#"{"positions": [{"deviceId": "bus-1", "lat": 0, "lon": 0, "timestamp": 1.5}]}"#;
        let positions = parse_positions(body).unwrap();
        assert_eq!(positions[0].timestamp.timestamp_millis(), 1500);
    }

    #[test]
    fn test_epoch_millis_are_normalised() {
        let body = br#"[
            {"deviceId": "bus-1", "lat": 1, "lon": 1, "timestamp": 1718000000000},
            {"deviceId": "bus-2", "lat": 1, "lon": 1, "timestamp": 1718000000250}
        ]"#;
        let positions = parse_positions(body).unwrap();
        assert_eq!(positions[0].timestamp.timestamp(), 1_718_000_000);
        assert_eq!(positions[1].timestamp.timestamp_millis(), 1_718_000_000_250);
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_positions(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse_positions(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let err = parse_positions(br#"[{"deviceId": "bus-1", "lat": 1.0, "timestamp": 1}]"#).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let err = parse_positions(br#"[{"deviceId": "bus-1", "lat": 123.0, "lon": 0, "timestamp": 1}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("positions[0]"));
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_negative_accuracy() {
        let err = parse_positions(
            br#"[{"deviceId": "bus-1", "lat": 1, "lon": 1, "timestamp": 1, "accuracy": -2}]"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_bad_timestamp_string() {
        let err = parse_positions(
            br#"[{"deviceId": "bus-1", "lat": 1, "lon": 1, "timestamp": "yesterday"}]"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_blank_device_id() {
        let err = parse_positions(br#"[{"deviceId": " ", "lat": 1, "lon": 1, "timestamp": 1}]"#)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }
}
