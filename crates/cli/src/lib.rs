//! CLI utilities for fleetmap
//!
//! Provides shared CLI functionality:
//! - Terminal output formatting
//! - Spinners for one-shot requests
//! - Status messages

#![warn(missing_docs)]

pub mod output;
pub mod progress;

pub use output::{OutputFormat, Status};
