//! Match normalization: one entry per player slot of a two-player match.

use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use super::mean;
use crate::models::{BracketSlot, CivId, EloBrackets, MatchRecord};

/// One player's view of one match.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMatchEntry {
    pub civ_id: CivId,
    pub opp_civ_id: CivId,
    pub won: bool,

    /// Mean of every rating snapshot in the match, shared by both players
    pub avg_elo: f64,

    pub bracket: BracketSlot,

    /// UTC calendar day the match started on
    pub day: NaiveDate,

    pub map_name: Option<String>,
    pub duration_secs: f64,
}

/// Why a match produced no entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Only two-player matches get an opponent assignment
    SlotCount(usize),
    EmptySlot,
    NoRatings,
    BadTimestamp(i64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SlotCount(n) => write!(f, "expected 2 player slots, found {}", n),
            SkipReason::EmptySlot => write!(f, "player slot has no history entries"),
            SkipReason::NoRatings => write!(f, "no rating snapshots"),
            SkipReason::BadTimestamp(ms) => write!(f, "unrepresentable match date {}", ms),
        }
    }
}

/// Counters from normalizing a batch of matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub matches_seen: usize,
    pub matches_skipped: usize,
    pub same_civ_dropped: usize,
    pub entries: usize,
}

/// Normalize a single match.
///
/// Returns the surviving entries (zero, one or two; an entry is dropped when
/// its civilization equals its opponent's) or the reason the whole match is
/// malformed.
pub fn normalize_match(
    record: &MatchRecord,
    brackets: &EloBrackets,
) -> Result<Vec<PlayerMatchEntry>, SkipReason> {
    let slots = record.slots();
    if slots.len() != 2 {
        return Err(SkipReason::SlotCount(slots.len()));
    }

    let (civ_a, civ_b) = match (slots[0].civ_id(), slots[1].civ_id()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(SkipReason::EmptySlot),
    };

    let avg_elo = mean(slots.iter().flat_map(|s| s.ratings())).ok_or(SkipReason::NoRatings)?;
    let day = record
        .match_day()
        .ok_or(SkipReason::BadTimestamp(record.match_date))?;
    let bracket = brackets.slot_for(avg_elo);

    let mut entries = Vec::with_capacity(2);
    for (slot, civ_id, opp_civ_id) in [(&slots[0], civ_a, civ_b), (&slots[1], civ_b, civ_a)] {
        if civ_id == opp_civ_id {
            continue;
        }
        entries.push(PlayerMatchEntry {
            civ_id,
            opp_civ_id,
            won: slot.won().unwrap_or(false),
            avg_elo,
            bracket,
            day,
            map_name: record.map_name().map(str::to_string),
            duration_secs: record.match_duration,
        });
    }

    Ok(entries)
}

/// Normalize a batch, skipping malformed matches.
pub fn normalize_matches(
    records: &[MatchRecord],
    brackets: &EloBrackets,
) -> (Vec<PlayerMatchEntry>, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut entries = Vec::with_capacity(records.len() * 2);

    for record in records {
        report.matches_seen += 1;
        match normalize_match(record, brackets) {
            Ok(found) => {
                report.same_civ_dropped += 2 - found.len();
                entries.extend(found);
            }
            Err(reason) => {
                report.matches_skipped += 1;
                debug!(
                    "Skipping match {:?} at {}: {}",
                    record.match_id, record.match_date, reason
                );
            }
        }
    }

    report.entries = entries.len();
    (entries, report)
}
