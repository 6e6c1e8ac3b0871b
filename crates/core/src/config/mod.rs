//! Configuration loading and schema definitions
//!
//! One explicit [`Config`] value is built at start-up and handed to every
//! component that needs it.

mod loader;
mod schema;

pub use loader::{Config, LOCAL_OVERLAY_FILE};
pub use schema::*;
