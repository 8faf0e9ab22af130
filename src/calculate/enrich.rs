//! Civilization name resolution against the reference table.

use std::collections::BTreeSet;

use tracing::warn;

use super::PlayerMatchEntry;
use crate::models::{CivId, CivilizationTable};

/// A normalized entry whose opponent has a known name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub entry: PlayerMatchEntry,
    pub opp_name: String,
}

/// Ids that failed to resolve during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub entries_dropped: usize,
    pub groups_dropped: usize,
    pub unknown_ids: BTreeSet<CivId>,
}

impl EnrichReport {
    /// Log the unknown ids once per run.
    pub fn log(&self) {
        if self.unknown_ids.is_empty() {
            return;
        }
        warn!(
            "Dropped {} entries and {} groups for civilizations missing from the reference table: {:?}",
            self.entries_dropped, self.groups_dropped, self.unknown_ids
        );
    }
}

/// Inner-join lookups against the civilization table.
pub struct ReferenceEnricher<'a> {
    civs: &'a CivilizationTable,
}

impl<'a> ReferenceEnricher<'a> {
    pub fn new(civs: &'a CivilizationTable) -> Self {
        Self { civs }
    }

    /// Attach opponent names, dropping entries whose opponent is unknown.
    pub fn resolve_opponents(
        &self,
        entries: Vec<PlayerMatchEntry>,
        report: &mut EnrichReport,
    ) -> Vec<ResolvedEntry> {
        entries
            .into_iter()
            .filter_map(|entry| match self.civs.name(entry.opp_civ_id) {
                Some(name) => Some(ResolvedEntry {
                    opp_name: name.to_string(),
                    entry,
                }),
                None => {
                    report.entries_dropped += 1;
                    report.unknown_ids.insert(entry.opp_civ_id);
                    None
                }
            })
            .collect()
    }

    /// Name for a grouped civilization; `None` means the group is dropped.
    pub fn resolve_civ(&self, civ_id: CivId, report: &mut EnrichReport) -> Option<&'a str> {
        let name = self.civs.name(civ_id);
        if name.is_none() {
            report.groups_dropped += 1;
            report.unknown_ids.insert(civ_id);
        }
        name
    }
}
