//! Haversine distance calculation.
//!
//! The Haversine formula calculates the great-circle distance between two points
//! on a sphere given their longitudes and latitudes.

use crate::Coordinate;

/// Earth's mean radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculates the great-circle distance between two coordinates in kilometers.
///
/// # Example
/// ```
/// use fleetmap_geo::{haversine_distance, Coordinate};
///
/// let berlin = Coordinate::new(52.5200, 13.4050);
/// let paris = Coordinate::new(48.8566, 2.3522);
///
/// let distance = haversine_distance(&berlin, &paris);
/// assert!((distance - 878.0).abs() < 10.0);
/// ```
#[inline]
#[must_use]
pub fn haversine_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    haversine_distance_with_radius(from, to, EARTH_RADIUS_KM)
}

/// Calculates the great-circle distance between two coordinates in meters.
///
/// This is the unit used for stop arrival checks.
#[inline]
#[must_use]
pub fn haversine_distance_meters(from: &Coordinate, to: &Coordinate) -> f64 {
    haversine_distance_with_radius(from, to, EARTH_RADIUS_M)
}

#[inline]
fn haversine_distance_with_radius(from: &Coordinate, to: &Coordinate, radius: f64) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius * c
}

/// Fast approximate distance in kilometers (equirectangular projection).
///
/// Good enough for movement thresholds over a few kilometers; use
/// [`haversine_distance`] when the exact figure matters.
#[inline]
#[must_use]
pub fn approximate_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let x = (lon2 - lon1) * ((lat1 + lat2) / 2.0).cos();
    let y = lat2 - lat1;

    (x * x + y * y).sqrt() * EARTH_RADIUS_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    const BERLIN: Coordinate = Coordinate::new(52.5200, 13.4050);
    const PARIS: Coordinate = Coordinate::new(48.8566, 2.3522);
    const DORM_3: Coordinate = Coordinate::new(36.768231, 126.935381);
    const DORM_1: Coordinate = Coordinate::new(36.767884, 126.932567);

    #[test]
    fn test_berlin_to_paris() {
        let distance = haversine_distance(&BERLIN, &PARIS);
        assert!((distance - 878.0).abs() < 5.0, "Berlin-Paris: {distance}");
    }

    #[test]
    fn test_short_campus_hop() {
        // Two neighbouring stops roughly 250 m apart
        let meters = haversine_distance_meters(&DORM_3, &DORM_1);
        assert!((200.0..300.0).contains(&meters), "dorm hop: {meters}");
    }

    #[test]
    fn test_same_point_zero_distance() {
        assert!(haversine_distance_meters(&DORM_3, &DORM_3).abs() < 1e-6);
    }

    #[test]
    fn test_symmetry() {
        let d1 = haversine_distance(&BERLIN, &PARIS);
        let d2 = haversine_distance(&PARIS, &BERLIN);
        assert!((d1 - d2).abs() < 0.001);
    }

    #[test]
    fn test_meters_conversion() {
        let km = haversine_distance(&BERLIN, &PARIS);
        let meters = haversine_distance_meters(&BERLIN, &PARIS);
        assert!((meters - km * 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_approximate_distance_reasonable() {
        let exact = haversine_distance(&DORM_3, &DORM_1);
        let approx = approximate_distance(&DORM_3, &DORM_1);
        let error = ((approx - exact) / exact).abs();
        assert!(error < 0.01, "Error: {}%", error * 100.0);
    }
}
