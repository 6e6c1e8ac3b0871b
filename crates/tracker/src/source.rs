//! Where the scheduler gets positions from

use fleetmap_api_client::{ApiResult, TelemetryClient};
use fleetmap_core::Position;
use std::future::Future;

/// A source of device positions. One call is one fetch attempt; retrying is
/// the caller's business.
pub trait PositionSource: Send + Sync {
    /// Latest fix of every device the source knows about
    fn fetch_positions(&self) -> impl Future<Output = ApiResult<Vec<Position>>> + Send;
}

impl PositionSource for TelemetryClient {
    fn fetch_positions(&self) -> impl Future<Output = ApiResult<Vec<Position>>> + Send {
        TelemetryClient::fetch_positions(self)
    }
}
