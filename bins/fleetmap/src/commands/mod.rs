//! CLI command implementations

pub mod config;
pub mod fetch;
pub mod occupancy;
pub mod watch;

use fleetmap_api_client::{ClientConfig, TelemetryClient};
use fleetmap_core::config::Config;
use fleetmap_tracker::PositionStore;

/// Client for the configured backend
pub fn client(config: &Config) -> anyhow::Result<TelemetryClient> {
    Ok(TelemetryClient::with_config(ClientConfig::from_backend(
        &config.schema.backend,
    ))?)
}

/// Empty store with configured staleness and device labels
pub fn store(config: &Config) -> PositionStore {
    let store = PositionStore::new(config.schema.store.stale_after());
    for device in config.schema.map.labelled_devices() {
        store.register(device);
    }
    store
}
