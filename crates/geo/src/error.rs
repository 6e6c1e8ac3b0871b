//! Error types for the geo crate.

use thiserror::Error;

/// Result type alias for geo operations.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur during geo operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Invalid coordinate values
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A route needs at least two stops
    #[error("Route needs at least 2 stops, got {0}")]
    RouteTooShort(usize),
}

/// Error code for integration with fleetmap-core error handling.
/// Range: 10xxx for geo errors.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoErrorCode {
    /// Invalid coordinate values
    InvalidCoordinate = 10001,
    /// Route with fewer than two stops
    RouteTooShort = 10002,
}

impl GeoError {
    /// Returns the error code for this error.
    #[must_use]
    pub fn code(&self) -> GeoErrorCode {
        match self {
            GeoError::InvalidCoordinate(_) => GeoErrorCode::InvalidCoordinate,
            GeoError::RouteTooShort(_) => GeoErrorCode::RouteTooShort,
        }
    }
}
