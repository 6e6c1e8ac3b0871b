//! Store-to-map reconciliation
//!
//! The presenter remembers which markers it has put on the surface. Each
//! [`MapPresenter::reconcile`] compares that with a fresh store snapshot and
//! issues only the calls needed to make the surface match:
//!
//! | snapshot vs. shown | call |
//! |--------------------|------|
//! | device not shown | `add_marker` |
//! | coordinate, label or stale flag differs | `move_marker` |
//! | shown device no longer in snapshot | `remove_marker` |
//!
//! Reconciling the same snapshot twice issues no calls the second time.

use crate::metric;
use crate::store::{DeviceState, StoreReader};
use chrono::{DateTime, Utc};
use fleetmap_core::DeviceId;
use fleetmap_geo::{Coordinate, Route, RouteLeg, RouteProgress};
use fleetmap_telemetry::metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One device marker as drawn on the surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Device the marker stands for
    pub device_id: DeviceId,
    /// Text shown next to the marker
    pub label: String,
    /// Where to draw it
    pub coordinate: Coordinate,
    /// Draw with the stale indicator
    pub stale: bool,
}

impl From<&DeviceState> for Marker {
    fn from(state: &DeviceState) -> Self {
        Self {
            device_id: state.device.id.clone(),
            label: state.device.name.clone(),
            coordinate: state.position.coordinate,
            stale: state.stale,
        }
    }
}

/// The rendering boundary. Implementations draw; the presenter decides what.
pub trait MarkerSurface {
    /// Draw a marker for a device not yet on the surface
    fn add_marker(&mut self, marker: &Marker);

    /// Redraw an existing marker with new coordinate, label or stale flag
    fn move_marker(&mut self, marker: &Marker);

    /// Take a device's marker off the surface
    fn remove_marker(&mut self, device_id: &DeviceId);

    /// The followed device is now on `leg`
    fn show_route_leg(&mut self, _leg: &RouteLeg) {}
}

/// Calls issued by one reconcile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// `add_marker` calls
    pub added: usize,
    /// `move_marker` calls
    pub updated: usize,
    /// `remove_marker` calls
    pub removed: usize,
}

impl ReconcileReport {
    /// No call was issued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

struct Follow {
    device: DeviceId,
    progress: RouteProgress,
    last_seen: Option<DateTime<Utc>>,
    announced: bool,
}

/// Keeps a [`MarkerSurface`] in step with the position store
pub struct MapPresenter<M> {
    reader: StoreReader,
    surface: M,
    shown: BTreeMap<DeviceId, Marker>,
    follow: Option<Follow>,
}

impl<M: MarkerSurface> MapPresenter<M> {
    /// Presenter drawing onto `surface` from `reader`
    pub fn new(reader: StoreReader, surface: M) -> Self {
        Self {
            reader,
            surface,
            shown: BTreeMap::new(),
            follow: None,
        }
    }

    /// Follow `device` along `route`, announcing each new leg to the surface
    #[must_use]
    pub fn with_route(mut self, device: DeviceId, route: Route) -> Self {
        self.follow = Some(Follow {
            device,
            progress: RouteProgress::new(route),
            last_seen: None,
            announced: false,
        });
        self
    }

    /// Bring the surface in line with the store as of now
    pub fn reconcile(&mut self) -> ReconcileReport {
        self.reconcile_at(Utc::now())
    }

    /// Bring the surface in line with the store, staleness judged at `now`
    pub fn reconcile_at(&mut self, now: DateTime<Utc>) -> ReconcileReport {
        let snapshot = self.reader.all_current_at(now);
        let mut report = ReconcileReport::default();

        let live: BTreeMap<DeviceId, Marker> = snapshot
            .iter()
            .map(|state| (state.device.id.clone(), Marker::from(state)))
            .collect();

        let gone: Vec<DeviceId> = self
            .shown
            .keys()
            .filter(|id| !live.contains_key(*id))
            .cloned()
            .collect();
        for id in gone {
            self.surface.remove_marker(&id);
            self.shown.remove(&id);
            report.removed += 1;
        }

        for (id, marker) in live {
            match self.shown.get(&id) {
                None => {
                    self.surface.add_marker(&marker);
                    report.added += 1;
                }
                Some(current) if *current != marker => {
                    self.surface.move_marker(&marker);
                    report.updated += 1;
                }
                Some(_) => continue,
            }
            self.shown.insert(id, marker);
        }

        self.advance_route(&snapshot);

        metrics().gauge(metric::MARKERS, self.shown.len() as u64);
        if !report.is_empty() {
            debug!(
                added = report.added,
                updated = report.updated,
                removed = report.removed,
                "Reconciled markers"
            );
        }
        report
    }

    fn advance_route(&mut self, snapshot: &[DeviceState]) {
        let Some(follow) = self.follow.as_mut() else {
            return;
        };

        if !follow.announced {
            self.surface.show_route_leg(&follow.progress.current_leg());
            follow.announced = true;
        }

        let Some(state) = snapshot.iter().find(|s| s.device.id == follow.device) else {
            return;
        };
        if follow.last_seen == Some(state.position.timestamp) {
            return;
        }
        follow.last_seen = Some(state.position.timestamp);

        if let Some(leg) = follow.progress.observe(&state.position.coordinate) {
            info!(device = %follow.device, leg = %leg, "Route leg changed");
            self.surface.show_route_leg(&leg);
        }
    }

    /// Markers currently on the surface, by device id
    #[must_use]
    pub fn markers(&self) -> &BTreeMap<DeviceId, Marker> {
        &self.shown
    }

    /// Leg of the followed device, if following
    #[must_use]
    pub fn current_leg(&self) -> Option<RouteLeg> {
        self.follow.as_ref().map(|f| f.progress.current_leg())
    }

    /// Route being followed
    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        self.follow.as_ref().map(|f| f.progress.route())
    }

    /// The surface
    pub fn surface(&self) -> &M {
        &self.surface
    }

    /// The surface, mutably
    pub fn surface_mut(&mut self) -> &mut M {
        &mut self.surface
    }
}
