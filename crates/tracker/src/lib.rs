//! Live position tracking for fleetmap
//!
//! Data flows one way:
//!
//! ```text
//! PollingScheduler ──fetch──▶ PositionSource
//!        │
//!        └──upsert──▶ PositionStore ──StoreReader──▶ MapPresenter ──▶ MarkerSurface
//! ```
//!
//! - [`PollingScheduler`] runs as one task, polls on a fixed cadence and backs
//!   off after failures. It is the only writer of the store.
//! - [`PositionStore`] keeps the newest fix per device. Readers never see a
//!   half-written fix.
//! - [`MapPresenter`] diffs store snapshots against what is on screen and
//!   issues the minimal add/move/remove calls.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod presenter;
pub mod scheduler;
pub mod source;
pub mod store;

pub use presenter::{MapPresenter, Marker, MarkerSurface, ReconcileReport};
pub use scheduler::{PollEvent, PollingScheduler, SchedulerConfig, SchedulerState};
pub use source::PositionSource;
pub use store::{DeviceState, PositionStore, StoreReader, UpsertOutcome};

/// Metric names recorded through `fleetmap-telemetry`
pub mod metric {
    /// Successful polls
    pub const POLL_SUCCESS: &str = "poll.success";
    /// Failed polls
    pub const POLL_FAILURE: &str = "poll.failure";
    /// Fetch latency histogram, milliseconds
    pub const FETCH_MS: &str = "poll.fetch_ms";
    /// Fixes discarded as not newer than the stored one
    pub const POSITIONS_IGNORED: &str = "store.ignored";
    /// Markers on screen after the last reconcile
    pub const MARKERS: &str = "presenter.markers";
}
