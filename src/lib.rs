//! # Civ Stats
//!
//! Rolls raw 1v1 match results up into per-civilization statistics.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (matches, brackets, builds, stats rows)
//! - **calculate**: Normalization, facet grouping and enrichment
//! - **storage**: The store trait, JSONL data lake and in-memory store
//! - **rollup**: Daily and per-patch rollup orchestration
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod models;
pub mod rollup;
pub mod storage;

pub use models::*;

use chrono::NaiveDate;

/// Parse a calendar date given as `MM/DD/YYYY` or `YYYY-MM-DD`.
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    ["%m/%d/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
