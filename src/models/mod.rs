//! Core data models for the stats rollups.

mod civilization;
mod elo_bracket;
mod ids;
mod match_record;
mod patch;
mod stats;
mod window;

pub use civilization::*;
pub use elo_bracket::*;
pub use ids::*;
pub use match_record::*;
pub use patch::*;
pub use stats::*;
pub use window::*;
