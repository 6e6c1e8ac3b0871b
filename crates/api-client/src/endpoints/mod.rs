//! Endpoint-specific API implementations
//!
//! | Module | Backend route | Description |
//! |--------|---------------|-------------|
//! | `positions` | `GET /devices/positions` | Latest fix per device |
//! | `occupancy` | `GET /bus/current_people` | Riders aboard and free seats |
//! | `prediction` | `GET /predict/offboard` | Drop-off estimate for a stop (prediction service) |

pub mod occupancy;
pub mod positions;
pub mod prediction;

pub use occupancy::{Occupancy, OccupancyApi};
pub use positions::{parse_positions, PositionsApi};
pub use prediction::{PredictionApi, PredictionQuery};
