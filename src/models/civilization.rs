//! Civilization ("major god") reference data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::CivId;

/// A row of the `major_gods` reference collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Civilization {
    pub id: CivId,
    pub name: String,
}

/// Exact-id lookup over the reference collection.
#[derive(Debug, Clone, Default)]
pub struct CivilizationTable {
    names: HashMap<CivId, String>,
}

impl CivilizationTable {
    /// Build the table. On duplicate ids the first row wins, matching a
    /// single-document lookup.
    pub fn new(civs: impl IntoIterator<Item = Civilization>) -> Self {
        let mut names = HashMap::new();
        for civ in civs {
            names.entry(civ.id).or_insert(civ.name);
        }
        Self { names }
    }

    pub fn name(&self, id: CivId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
