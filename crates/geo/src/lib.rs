//! Geospatial primitives for fleetmap.
//!
//! This crate provides:
//! - [`Coordinate`] with range validation
//! - Haversine distance calculations
//! - Stop-to-stop route progression for a followed vehicle
//!
//! # Example
//!
//! ```
//! use fleetmap_geo::{haversine_distance_meters, Coordinate};
//!
//! let back_gate = Coordinate::new(36.772679, 126.933898);
//! let library = Coordinate::new(36.768848, 126.931297);
//!
//! let meters = haversine_distance_meters(&back_gate, &library);
//! assert!(meters > 400.0 && meters < 550.0);
//! ```

mod error;
mod haversine;
pub mod route;

pub use error::{GeoError, GeoErrorCode, Result};
pub use haversine::{
    approximate_distance, haversine_distance, haversine_distance_meters, EARTH_RADIUS_KM,
    EARTH_RADIUS_M,
};
pub use route::{Route, RouteLeg, RouteProgress, Stop, DEFAULT_ARRIVAL_RADIUS_M};

/// A geographic coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    ///
    /// # Arguments
    /// * `latitude` - Latitude in degrees (-90 to 90)
    /// * `longitude` - Longitude in degrees (-180 to 180)
    #[inline]
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Creates a coordinate, rejecting NaN and out-of-range values.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self::new(latitude, longitude);
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GeoError::InvalidCoordinate(format!(
                "({latitude}, {longitude}) is outside lat [-90, 90] / lon [-180, 180]"
            )))
        }
    }

    /// Returns true if the coordinate has valid values.
    ///
    /// NaN components are never valid.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Converts degrees to radians for internal calculations.
    #[inline]
    pub(crate) fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self::new(lat, lon)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}
