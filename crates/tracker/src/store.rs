//! Latest position per device
//!
//! One writer (the polling task) and any number of readers. Each fix is
//! published as an `Arc<Position>` under a short write lock, so a reader
//! either sees the previous fix or the new one, never a mix.
//!
//! Per device the stored timestamp never decreases: a fix that is not
//! strictly newer than the stored one is ignored. This is what makes late,
//! out-of-order responses harmless.

use chrono::{DateTime, Utc};
use fleetmap_core::{Device, DeviceId, Position};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// What [`PositionStore::upsert`] did with a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// First fix for this device
    Inserted,
    /// Replaced an older fix
    Updated,
    /// Not newer than the stored fix; store unchanged
    Ignored,
}

/// A device with its current fix, as seen at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    /// The device
    pub device: Device,
    /// Its most recent fix
    pub position: Position,
    /// Older than the staleness threshold at snapshot time
    pub stale: bool,
    /// Age of the fix at snapshot time
    pub age: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    names: HashMap<DeviceId, String>,
    positions: HashMap<DeviceId, Arc<Position>>,
}

impl Inner {
    fn snapshot(&self, stale_after: Duration, now: DateTime<Utc>) -> Vec<DeviceState> {
        let mut states: Vec<DeviceState> = self
            .positions
            .iter()
            .map(|(id, position)| {
                let device = match self.names.get(id) {
                    Some(name) => Device::new(id.clone(), name.as_str()),
                    None => Device::unnamed(id.clone()),
                };
                let age = position.age_at(now);
                DeviceState {
                    device,
                    position: Position::clone(position),
                    stale: age > stale_after,
                    age,
                }
            })
            .collect();
        states.sort_by(|a, b| a.device.id.cmp(&b.device.id));
        states
    }
}

/// Writable position store. Not `Clone`: hand out [`StoreReader`]s instead.
#[derive(Debug)]
pub struct PositionStore {
    inner: Arc<RwLock<Inner>>,
    stale_after: Duration,
}

impl PositionStore {
    /// Empty store marking fixes older than `stale_after` as stale
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            stale_after,
        }
    }

    /// Give a device a display name. Devices never registered are named after their id.
    pub fn register(&self, device: Device) {
        self.inner.write().names.insert(device.id, device.name);
    }

    /// Store `position` if it is strictly newer than the device's current fix
    pub fn upsert(&self, position: Position) -> UpsertOutcome {
        let mut inner = self.inner.write();
        let outcome = match inner.positions.get(&position.device_id) {
            None => UpsertOutcome::Inserted,
            Some(current) if position.is_newer_than(current) => UpsertOutcome::Updated,
            Some(current) => {
                trace!(
                    device = %position.device_id,
                    stored = %current.timestamp,
                    received = %position.timestamp,
                    "Ignoring fix that is not newer"
                );
                UpsertOutcome::Ignored
            }
        };

        if outcome != UpsertOutcome::Ignored {
            inner
                .positions
                .insert(position.device_id.clone(), Arc::new(position));
        }
        outcome
    }

    /// Current fix of one device
    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<Position> {
        self.inner.read().positions.get(id).map(|p| Position::clone(p))
    }

    /// Every device with a fix, sorted by id, staleness computed now
    #[must_use]
    pub fn all_current(&self) -> Vec<DeviceState> {
        self.all_current_at(Utc::now())
    }

    /// Every device with a fix, sorted by id, staleness computed at `now`
    #[must_use]
    pub fn all_current_at(&self, now: DateTime<Utc>) -> Vec<DeviceState> {
        self.inner.read().snapshot(self.stale_after, now)
    }

    /// Number of devices with a fix
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().positions.len()
    }

    /// No fix stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Staleness threshold
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Read-only handle sharing this store
    #[must_use]
    pub fn reader(&self) -> StoreReader {
        StoreReader {
            inner: Arc::clone(&self.inner),
            stale_after: self.stale_after,
        }
    }
}

/// Read-only view of a [`PositionStore`]. Cheap to clone; usable from any thread.
#[derive(Debug, Clone)]
pub struct StoreReader {
    inner: Arc<RwLock<Inner>>,
    stale_after: Duration,
}

impl StoreReader {
    /// Current fix of one device
    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<Position> {
        self.inner.read().positions.get(id).map(|p| Position::clone(p))
    }

    /// Every device with a fix, sorted by id, staleness computed now
    #[must_use]
    pub fn all_current(&self) -> Vec<DeviceState> {
        self.all_current_at(Utc::now())
    }

    /// Every device with a fix, sorted by id, staleness computed at `now`
    #[must_use]
    pub fn all_current_at(&self, now: DateTime<Utc>) -> Vec<DeviceState> {
        self.inner.read().snapshot(self.stale_after, now)
    }

    /// Number of devices with a fix
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().positions.len()
    }

    /// No fix stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleetmap_geo::Coordinate;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn fix(id: &str, secs: i64, lat: f64, lon: f64) -> Position {
        Position::new(id, Coordinate::new(lat, lon), at(secs), 5.0)
    }

    #[test]
    fn test_older_fix_is_ignored() {
        let store = PositionStore::new(Duration::from_secs(30));
        assert_eq!(store.upsert(fix("bus-1", 1, 0.0, 0.0)), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(fix("bus-1", 0, 5.0, 5.0)), UpsertOutcome::Ignored);

        let current = store.get(&DeviceId::new("bus-1")).unwrap();
        assert_eq!(current.timestamp, at(1));
        assert_eq!(current.coordinate, Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_equal_timestamp_is_ignored() {
        let store = PositionStore::new(Duration::from_secs(30));
        store.upsert(fix("bus-1", 10, 1.0, 1.0));
        assert_eq!(store.upsert(fix("bus-1", 10, 2.0, 2.0)), UpsertOutcome::Ignored);
        assert_eq!(
            store.get(&DeviceId::new("bus-1")).unwrap().coordinate,
            Coordinate::new(1.0, 1.0)
        );
    }

    #[test]
    fn test_newer_fix_replaces() {
        let store = PositionStore::new(Duration::from_secs(30));
        store.upsert(fix("bus-1", 10, 1.0, 1.0));
        assert_eq!(store.upsert(fix("bus-1", 11, 2.0, 2.0)), UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_millisecond_payload_does_not_block_later_fixes() {
        let store = PositionStore::new(Duration::from_secs(30));
        let first = fleetmap_api_client::parse_positions(
            br#"[{"deviceId": "bus-1", "lat": 1, "lon": 1, "timestamp": 1718000000000}]"#,
        )
        .unwrap();
        let later = fleetmap_api_client::parse_positions(
            br#"[{"deviceId": "bus-1", "lat": 2, "lon": 2, "timestamp": 1718003600}]"#,
        )
        .unwrap();

        assert_eq!(store.upsert(first[0].clone()), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(later[0].clone()), UpsertOutcome::Updated);

        let states = store.all_current_at(at(1_718_003_600 + 60));
        assert!(states[0].stale);
        assert_eq!(states[0].age, Duration::from_secs(60));
    }

    #[test]
    fn test_snapshot_sorted_and_named() {
        let store = PositionStore::new(Duration::from_secs(30));
        store.register(Device::new("bus-2", "Night Shuttle"));
        store.upsert(fix("bus-2", 100, 1.0, 1.0));
        store.upsert(fix("bus-1", 100, 2.0, 2.0));

        let states = store.all_current_at(at(110));
        let ids: Vec<&str> = states.iter().map(|s| s.device.id.as_str()).collect();
        assert_eq!(ids, ["bus-1", "bus-2"]);
        assert_eq!(states[0].device.name, "bus-1");
        assert_eq!(states[1].device.name, "Night Shuttle");
        assert_eq!(states[0].age, Duration::from_secs(10));
    }

    #[test]
    fn test_staleness_is_computed_at_snapshot_time() {
        let store = PositionStore::new(Duration::from_secs(30));
        store.upsert(fix("bus-1", 100, 1.0, 1.0));

        assert!(!store.all_current_at(at(130))[0].stale);
        assert!(store.all_current_at(at(131))[0].stale);
        // Still listed when stale
        assert_eq!(store.all_current_at(at(10_000)).len(), 1);
    }

    #[test]
    fn test_registered_device_without_fix_is_not_listed() {
        let store = PositionStore::new(Duration::from_secs(30));
        store.register(Device::new("bus-9", "Spare"));
        assert!(store.is_empty());
        assert!(store.all_current().is_empty());
    }

    #[test]
    fn test_reader_sees_writes() {
        let store = PositionStore::new(Duration::from_secs(30));
        let reader = store.reader();
        assert!(reader.is_empty());

        store.upsert(fix("bus-1", 1, 3.0, 4.0));
        assert_eq!(reader.len(), 1);
        assert_eq!(
            reader.get(&DeviceId::new("bus-1")).unwrap().coordinate,
            Coordinate::new(3.0, 4.0)
        );
    }

    #[test]
    fn test_concurrent_readers_see_whole_fixes() {
        let store = PositionStore::new(Duration::from_secs(30));
        let reader = store.reader();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = reader.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        if let Some(p) = reader.get(&DeviceId::new("bus-1")) {
                            // Writer keeps lat == lon == timestamp
                            assert_eq!(p.coordinate.latitude, p.coordinate.longitude);
                            assert_eq!(p.coordinate.latitude as i64, p.timestamp.timestamp());
                        }
                    }
                })
            })
            .collect();

        for t in 0..80 {
            store.upsert(fix("bus-1", t, t as f64, t as f64));
        }
        for handle in readers {
            handle.join().unwrap();
        }
    }

    proptest! {
        #[test]
        fn prop_get_returns_newest_seen(
            timestamps in proptest::collection::vec(0i64..50, 1..40)
        ) {
            let store = PositionStore::new(Duration::from_secs(30));
            for (i, t) in timestamps.iter().enumerate() {
                store.upsert(fix("bus-1", *t, i as f64 / 100.0, 0.0));
            }

            let newest = *timestamps.iter().max().unwrap();
            let first_newest = timestamps.iter().position(|t| *t == newest).unwrap();
            let current = store.get(&DeviceId::new("bus-1")).unwrap();

            prop_assert_eq!(current.timestamp, at(newest));
            prop_assert_eq!(current.coordinate.latitude, first_newest as f64 / 100.0);
        }
    }
}
