//! HTTP client for the fleetmap IoT backend
//!
//! One call, one round trip: the client never retries. Retry and backoff
//! belong to the polling scheduler in `fleetmap-tracker`.
//!
//! # Features
//!
//! - **Position feed**: `GET /devices/positions`, validated into [`fleetmap_core::Position`]s
//! - **Ridership**: riders aboard and free seats
//! - **Drop-off prediction**: estimate for the next stop
//! - **Bounded waits**: every request fails with [`ApiError::Timeout`] past its deadline
//! - **Request correlation**: every request carries an `X-Request-ID`
//!
//! # Example
//!
//! ```rust,no_run
//! use fleetmap_api_client::{ClientConfig, TelemetryClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TelemetryClient::with_config(ClientConfig::default())?;
//!
//!     for fix in client.fetch_positions().await? {
//!         println!("{} at {}", fix.device_id, fix.coordinate);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;

pub use client::TelemetryClient;
pub use config::ClientConfig;
pub use endpoints::{parse_positions, Occupancy, PredictionQuery};
pub use error::{ApiError, ApiResult, FailureKind};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::TelemetryClient;
    pub use crate::config::ClientConfig;
    pub use crate::endpoints::{Occupancy, OccupancyApi, PositionsApi, PredictionApi, PredictionQuery};
    pub use crate::error::{ApiError, ApiResult, FailureKind};
}
