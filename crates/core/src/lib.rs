//! Core types for fleetmap
//!
//! This crate provides shared functionality used by the client, tracker and binary:
//!
//! - **Model**: devices and immutable position fixes
//! - **Error handling**: structured errors with codes, context and recovery suggestions
//! - **Backoff**: poll interval growth after consecutive failures
//! - **Configuration**: TOML files, local secret overlay, environment overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use fleetmap_core::config::Config;
//!
//! let config = Config::load(None).expect("valid configuration");
//! println!("polling {}", config.schema.backend.base_url);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, ErrorCode, Result, ResultExt};
pub use model::{Device, DeviceId, Position};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backoff::{Backoff, BackoffConfig};
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::model::{Device, DeviceId, Position};
    pub use fleetmap_geo::Coordinate;
}
