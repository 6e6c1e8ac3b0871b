//! Circular stop-to-stop route progression.
//!
//! A followed vehicle starts on the leg `stops[0] ➡ stops[1]`. Whenever one of
//! its fixes lands within the arrival radius of the next stop, progression
//! advances by one stop, wrapping back to the first stop after the last.

use crate::{haversine_distance_meters, Coordinate, GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance in meters under which a vehicle counts as arrived at a stop.
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 25.0;

/// A named stop on a route. Also drawn as a fixed landmark on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Display name
    pub name: String,
    /// Stop location
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

impl Stop {
    /// Create a new stop
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
        }
    }
}

/// An ordered, circular list of stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    stops: Vec<Stop>,
    arrival_radius_m: f64,
}

impl Route {
    /// Build a route. Needs at least two stops, all with valid coordinates.
    pub fn new(stops: Vec<Stop>) -> Result<Self> {
        if stops.len() < 2 {
            return Err(GeoError::RouteTooShort(stops.len()));
        }
        if let Some(bad) = stops.iter().find(|s| !s.coordinate.is_valid()) {
            return Err(GeoError::InvalidCoordinate(format!(
                "stop '{}' at {}",
                bad.name, bad.coordinate
            )));
        }
        Ok(Self {
            stops,
            arrival_radius_m: DEFAULT_ARRIVAL_RADIUS_M,
        })
    }

    /// Override the arrival radius (meters)
    #[must_use]
    pub fn with_arrival_radius(mut self, meters: f64) -> Self {
        self.arrival_radius_m = meters;
        self
    }

    /// All stops, in route order
    #[must_use]
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Arrival radius in meters
    #[must_use]
    pub fn arrival_radius_m(&self) -> f64 {
        self.arrival_radius_m
    }

    /// The leg that starts at stop `index` (wrapping)
    #[must_use]
    pub fn leg(&self, index: usize) -> RouteLeg {
        let from = index % self.stops.len();
        let to = (from + 1) % self.stops.len();
        RouteLeg {
            from_index: from,
            from: self.stops[from].name.clone(),
            to: self.stops[to].name.clone(),
        }
    }
}

/// One leg of a route, e.g. `Library ➡ Humanities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteLeg {
    /// Index of the departure stop
    pub from_index: usize,
    /// Departure stop name
    pub from: String,
    /// Next stop name
    pub to: String,
}

impl RouteLeg {
    /// 1-based number of the departure stop, as the prediction service expects
    #[must_use]
    pub fn stop_number(&self) -> usize {
        self.from_index + 1
    }
}

impl fmt::Display for RouteLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ➡ {}", self.from, self.to)
    }
}

/// Tracks which leg a followed vehicle is on.
#[derive(Debug, Clone)]
pub struct RouteProgress {
    route: Route,
    index: usize,
}

impl RouteProgress {
    /// Start at the first leg of `route`
    #[must_use]
    pub fn new(route: Route) -> Self {
        Self { route, index: 0 }
    }

    /// The route being followed
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Leg the vehicle is currently on
    #[must_use]
    pub fn current_leg(&self) -> RouteLeg {
        self.route.leg(self.index)
    }

    /// Feed a fix. Returns the new leg when the fix reaches the next stop.
    pub fn observe(&mut self, at: &Coordinate) -> Option<RouteLeg> {
        let next = (self.index + 1) % self.route.stops.len();
        let distance = haversine_distance_meters(at, &self.route.stops[next].coordinate);
        if distance < self.route.arrival_radius_m {
            self.index = next;
            Some(self.current_leg())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campus() -> Route {
        Route::new(vec![
            Stop::new("Back Gate", Coordinate::new(36.772679, 126.933898)),
            Stop::new("Dorm 3", Coordinate::new(36.768231, 126.935381)),
            Stop::new("Dorm 1", Coordinate::new(36.767884, 126.932567)),
            Stop::new("Library", Coordinate::new(36.768848, 126.931297)),
            Stop::new("Humanities", Coordinate::new(36.768981, 126.928032)),
        ])
        .unwrap()
    }

    #[test]
    fn test_route_requires_two_stops() {
        let err = Route::new(vec![Stop::new("Only", Coordinate::new(0.0, 0.0))]).unwrap_err();
        assert!(matches!(err, GeoError::RouteTooShort(1)));
    }

    #[test]
    fn test_route_rejects_invalid_stop() {
        let err = Route::new(vec![
            Stop::new("A", Coordinate::new(0.0, 0.0)),
            Stop::new("B", Coordinate::new(95.0, 0.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, GeoError::InvalidCoordinate(_)));
    }

    #[test]
    fn test_initial_leg() {
        let progress = RouteProgress::new(campus());
        let leg = progress.current_leg();
        assert_eq!(leg.to_string(), "Back Gate ➡ Dorm 3");
        assert_eq!(leg.stop_number(), 1);
    }

    #[test]
    fn test_advances_within_radius() {
        let mut progress = RouteProgress::new(campus());
        // ~11 m north of Dorm 3
        let leg = progress.observe(&Coordinate::new(36.768331, 126.935381)).unwrap();
        assert_eq!(leg.to_string(), "Dorm 3 ➡ Dorm 1");
    }

    #[test]
    fn test_ignores_fix_outside_radius() {
        let mut progress = RouteProgress::new(campus());
        // ~55 m away from Dorm 3
        assert!(progress.observe(&Coordinate::new(36.768731, 126.935381)).is_none());
        assert_eq!(progress.current_leg().from_index, 0);
    }

    #[test]
    fn test_only_next_stop_counts() {
        let mut progress = RouteProgress::new(campus());
        // Sitting on the library does not skip ahead
        assert!(progress.observe(&Coordinate::new(36.768848, 126.931297)).is_none());
    }

    #[test]
    fn test_wraps_after_last_stop() {
        let route = campus();
        let stops: Vec<Coordinate> = route.stops().iter().map(|s| s.coordinate).collect();
        let mut progress = RouteProgress::new(route);
        for stop in stops.iter().skip(1) {
            assert!(progress.observe(stop).is_some());
        }
        assert_eq!(progress.current_leg().to_string(), "Humanities ➡ Back Gate");
        assert!(progress.observe(&stops[0]).is_some());
        assert_eq!(progress.current_leg().from_index, 0);
    }

    #[test]
    fn test_stop_deserializes_flat() {
        let stop: Stop =
            serde_json::from_str(r#"{"name":"Library","latitude":36.768848,"longitude":126.931297}"#)
                .unwrap();
        assert_eq!(stop.name, "Library");
        assert_eq!(stop.coordinate.longitude, 126.931297);
    }
}
