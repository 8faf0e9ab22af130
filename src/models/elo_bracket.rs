//! Elo brackets used to segment statistics.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label of the synthetic bracket spanning the whole table.
pub const ALL_ELO_LABEL: &str = "all";

/// Errors in a bracket cutoff table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("Elo bracket table is empty")]
    Empty,

    #[error("Elo bracket {index} has lower bound {lower} above upper bound {upper}")]
    Inverted { index: usize, lower: i64, upper: i64 },

    #[error("Elo bracket {index} starts at {lower}, expected {expected} to stay contiguous")]
    Gap {
        index: usize,
        lower: i64,
        expected: i64,
    },
}

/// One `[lower, upper]` entry of the cutoff table, as written in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EloCutoff {
    pub lower: i64,
    pub upper: i64,
}

impl EloCutoff {
    pub const fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }
}

/// Cutoffs the stats site has published since launch.
pub const DEFAULT_ELO_CUTOFFS: [EloCutoff; 6] = [
    EloCutoff::new(0, 750),
    EloCutoff::new(751, 1000),
    EloCutoff::new(1001, 1250),
    EloCutoff::new(1251, 1500),
    EloCutoff::new(1501, 1750),
    EloCutoff::new(1751, 2000),
];

/// A labelled bracket with inclusive integer bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EloBracket {
    pub label: String,
    pub lower: i64,
    pub upper: i64,
}

impl EloBracket {
    fn from_cutoff(cutoff: EloCutoff) -> Self {
        Self {
            label: format!("{}-{}", cutoff.lower, cutoff.upper),
            lower: cutoff.lower,
            upper: cutoff.upper,
        }
    }
}

/// Position of a bracket within a table, or the synthetic all-Elo bracket.
///
/// Orders table brackets ascending, with `AllElo` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BracketSlot {
    Table(usize),
    AllElo,
}

impl BracketSlot {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, BracketSlot::AllElo)
    }
}

/// A validated, ordered, contiguous bracket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EloBrackets {
    brackets: Vec<EloBracket>,
    all_elo: EloBracket,
}

impl EloBrackets {
    /// Validate a cutoff table: non-empty, every entry `lower <= upper`, and
    /// each entry starting one above the previous entry's upper bound.
    pub fn new(cutoffs: &[EloCutoff]) -> Result<Self, BracketError> {
        let (first, last) = match (cutoffs.first(), cutoffs.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(BracketError::Empty),
        };

        for (index, cutoff) in cutoffs.iter().enumerate() {
            if cutoff.lower > cutoff.upper {
                return Err(BracketError::Inverted {
                    index,
                    lower: cutoff.lower,
                    upper: cutoff.upper,
                });
            }
            if index > 0 {
                // A predecessor ending at i64::MAX leaves no room for this entry
                let expected = cutoffs[index - 1].upper.checked_add(1);
                if expected != Some(cutoff.lower) {
                    return Err(BracketError::Gap {
                        index,
                        lower: cutoff.lower,
                        expected: expected.unwrap_or(i64::MAX),
                    });
                }
            }
        }

        Ok(Self {
            brackets: cutoffs.iter().copied().map(EloBracket::from_cutoff).collect(),
            all_elo: EloBracket {
                label: ALL_ELO_LABEL.to_string(),
                lower: first.lower,
                upper: last.upper,
            },
        })
    }

    /// Bracket for an average Elo. First match wins: every bracket but the
    /// last takes values below the next bracket's lower bound, so an integer
    /// sitting on a boundary stays in the bracket whose label contains it;
    /// the last bracket is open-ended.
    ///
    /// The test is `avg < lower[i + 1]`, i.e. `avg < upper[i] + 1`, not the
    /// stricter `avg < upper[i]`. With the default table 750.0 lands in
    /// `0-750` and 999.5 in `751-1000`, where `< upper` would give
    /// `751-1000` and `1001-1250`. This matches the hard-coded `< 751`
    /// cutoffs the daily stats have always been bucketed with.
    pub fn slot_for(&self, avg_elo: f64) -> BracketSlot {
        let last = self.brackets.len() - 1;
        for (index, next) in self.brackets.iter().enumerate().skip(1) {
            if avg_elo < next.lower as f64 {
                return BracketSlot::Table(index - 1);
            }
        }
        BracketSlot::Table(last)
    }

    pub fn get(&self, slot: BracketSlot) -> &EloBracket {
        match slot {
            BracketSlot::Table(index) => &self.brackets[index],
            BracketSlot::AllElo => &self.all_elo,
        }
    }

    /// Numeric bounds for a label, re-derived from the table.
    pub fn bounds_for_label(&self, label: &str) -> Option<(i64, i64)> {
        if label == ALL_ELO_LABEL {
            return Some((self.all_elo.lower, self.all_elo.upper));
        }
        self.brackets
            .iter()
            .find(|b| b.label == label)
            .map(|b| (b.lower, b.upper))
    }

    pub fn all_elo(&self) -> &EloBracket {
        &self.all_elo
    }

    pub fn brackets(&self) -> &[EloBracket] {
        &self.brackets
    }

}

impl Default for EloBrackets {
    fn default() -> Self {
        // DEFAULT_ELO_CUTOFFS is contiguous by construction
        let brackets = DEFAULT_ELO_CUTOFFS
            .iter()
            .copied()
            .map(EloBracket::from_cutoff)
            .collect();
        Self {
            brackets,
            all_elo: EloBracket {
                label: ALL_ELO_LABEL.to_string(),
                lower: DEFAULT_ELO_CUTOFFS[0].lower,
                upper: DEFAULT_ELO_CUTOFFS[DEFAULT_ELO_CUTOFFS.len() - 1].upper,
            },
        }
    }
}

impl fmt::Display for EloBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
