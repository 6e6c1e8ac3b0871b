//! Ridership endpoint
//!
//! `GET <base>/bus/current_people` reports how many riders are aboard and how
//! many seats are free.

use crate::client::TelemetryClient;
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};

/// Path of the ridership endpoint
pub const OCCUPANCY_PATH: &str = "bus/current_people";

/// Ridership API interface
#[derive(Clone)]
pub struct OccupancyApi {
    client: TelemetryClient,
}

impl OccupancyApi {
    /// Create a new ridership API interface
    pub(crate) fn new(client: TelemetryClient) -> Self {
        Self { client }
    }

    /// Current riders and free seats
    pub async fn current(&self) -> ApiResult<Occupancy> {
        let url = self.client.url(OCCUPANCY_PATH);
        self.client.get_json(&url).await
    }
}

/// Ridership snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// Riders currently aboard
    #[serde(rename = "current_people")]
    pub riders: u32,
    /// Free seats; negative when over capacity
    pub available: i32,
}
