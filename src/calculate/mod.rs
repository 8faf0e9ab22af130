//! Statistics calculation engine.
//!
//! Turns raw match documents into rolled-up stats records:
//! - Normalization of match documents into per-player entries
//! - Grouping into the by-civ, by-matchup and by-map facets
//! - Civilization name enrichment
//! - Derived measures (win rate, play rate, average duration)

mod enrich;
mod facets;
mod normalize;
mod pipeline;

pub use enrich::*;
pub use facets::*;
pub use normalize::*;
pub use pipeline::*;

/// Win rate as a percentage, 0 when there are no games.
pub fn calculate_win_rate(wins: u32, games: u32) -> f64 {
    if games == 0 {
        0.0
    } else {
        100.0 * wins as f64 / games as f64
    }
}

/// Share of a civilization's games played in one bracket, as a percentage.
pub fn calculate_play_rate(bracket_games: u32, civ_games: u32) -> f64 {
    if civ_games == 0 {
        0.0
    } else {
        100.0 * bracket_games as f64 / civ_games as f64
    }
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0u64), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Convert a duration in seconds to minutes.
pub fn seconds_to_minutes(secs: f64) -> f64 {
    secs / 60.0
}
