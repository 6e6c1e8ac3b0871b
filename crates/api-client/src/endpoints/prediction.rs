//! Drop-off prediction endpoint
//!
//! `GET <prediction>/predict/offboard?stop_number=&hour=&minute=&weekday=`
//! estimates how many riders leave at a stop. `weekday` counts from Sunday = 0
//! and `stop_number` from 1.

use crate::client::{join_url, TelemetryClient};
use crate::error::ApiResult;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Path of the prediction endpoint
pub const PREDICTION_PATH: &str = "predict/offboard";

/// Prediction API interface
#[derive(Clone)]
pub struct PredictionApi {
    client: TelemetryClient,
}

impl PredictionApi {
    /// Create a new prediction API interface
    pub(crate) fn new(client: TelemetryClient) -> Self {
        Self { client }
    }

    /// Predicted drop-offs; `None` when the service has no estimate
    pub async fn offboard(&self, query: &PredictionQuery) -> ApiResult<Option<u32>> {
        let url = join_url(&self.client.config().prediction_url, PREDICTION_PATH);
        let response: PredictionResponse = self.client.get_json_with_query(&url, Some(query)).await?;
        if response.predicted_offboard.is_none() {
            warn!(stop_number = query.stop_number, "Prediction service returned no estimate");
        }
        Ok(response.predicted_offboard)
    }
}

/// Query parameters of a prediction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionQuery {
    /// 1-based stop number along the route
    pub stop_number: usize,
    /// Hour of day, local time
    pub hour: u32,
    /// Minute of hour
    pub minute: u32,
    /// Day of week, Sunday = 0
    pub weekday: u32,
}

impl PredictionQuery {
    /// Query for `stop_number` at local time `at`
    #[must_use]
    pub fn new(stop_number: usize, at: NaiveDateTime) -> Self {
        Self {
            stop_number,
            hour: at.hour(),
            minute: at.minute(),
            weekday: at.weekday().num_days_from_sunday(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predicted_offboard: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_query_from_local_time() {
        // 2024-06-09 was a Sunday
        let at = NaiveDate::from_ymd_opt(2024, 6, 9)
            .unwrap()
            .and_hms_opt(8, 45, 0)
            .unwrap();
        let query = PredictionQuery::new(3, at);
        assert_eq!(query.hour, 8);
        assert_eq!(query.minute, 45);
        assert_eq!(query.weekday, 0);
        assert_eq!(query.stop_number, 3);
    }

    #[test]
    fn test_response_without_estimate() {
        let response: PredictionResponse =
            serde_json::from_str(r#"{"error": "model not loaded"}"#).unwrap();
        assert!(response.predicted_offboard.is_none());
    }

    #[test]
    fn test_response_with_estimate() {
        let response: PredictionResponse =
            serde_json::from_str(r#"{"predicted_offboard": 4}"#).unwrap();
        assert_eq!(response.predicted_offboard, Some(4));
    }
}
