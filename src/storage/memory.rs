//! In-process store, used by tests and local experiments.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    merge_upserts, validate_target, MatchQuery, StatsStore, StorageError, UpsertOutcome,
};
use crate::models::{AggregateRecord, BuildRecord, Civilization, MatchRecord, RecordId};

/// [`StatsStore`] over in-memory vectors.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matches: Vec<MatchRecord>,
    civilizations: Vec<Civilization>,
    builds: Vec<BuildRecord>,
    targets: RwLock<HashMap<String, Vec<AggregateRecord>>>,
}

impl MemoryStore {
    pub fn new(
        matches: Vec<MatchRecord>,
        civilizations: Vec<Civilization>,
        builds: Vec<BuildRecord>,
    ) -> Self {
        Self {
            matches,
            civilizations,
            builds,
            targets: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn find_matches(&self, query: &MatchQuery) -> Result<Vec<MatchRecord>, StorageError> {
        Ok(self
            .matches
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect())
    }

    async fn civilizations(&self) -> Result<Vec<Civilization>, StorageError> {
        Ok(self.civilizations.clone())
    }

    async fn builds(&self) -> Result<Vec<BuildRecord>, StorageError> {
        let mut builds = self.builds.clone();
        builds.sort_by_key(|b| b.release_date);
        Ok(builds)
    }

    async fn insert_many(
        &self,
        target: &str,
        records: &[AggregateRecord],
    ) -> Result<usize, StorageError> {
        validate_target(target)?;
        let mut targets = self.targets.write().await;
        targets
            .entry(target.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }

    async fn upsert_many(
        &self,
        target: &str,
        records: &[AggregateRecord],
    ) -> Result<UpsertOutcome, StorageError> {
        validate_target(target)?;
        let mut targets = self.targets.write().await;
        let existing = targets.entry(target.to_string()).or_default();
        Ok(merge_upserts(existing, records))
    }

    async fn load_stats(&self, target: &str) -> Result<Vec<AggregateRecord>, StorageError> {
        validate_target(target)?;
        Ok(self
            .targets
            .read()
            .await
            .get(target)
            .cloned()
            .unwrap_or_default())
    }

    async fn existing_ids(
        &self,
        target: &str,
        ids: &HashSet<RecordId>,
    ) -> Result<HashSet<RecordId>, StorageError> {
        validate_target(target)?;
        let targets = self.targets.read().await;
        Ok(targets
            .get(target)
            .into_iter()
            .flatten()
            .filter(|r| ids.contains(&r.id))
            .map(|r| r.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(mode: &str, date: i64) -> MatchRecord {
        MatchRecord {
            match_id: None,
            game_mode: mode.to_string(),
            match_date: date,
            match_duration: 60.0,
            map_data: None,
            match_history_map: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_find_matches_filters_mode_and_window() {
        let store = MemoryStore::new(
            vec![
                record("1V1_SUPREMACY", 5),
                record("1V1_SUPREMACY", 10),
                record("TEAM_SUPREMACY", 5),
            ],
            vec![],
            vec![],
        );
        let query = MatchQuery {
            game_mode: "1V1_SUPREMACY".to_string(),
            start_ms: 0,
            end_ms: 10,
        };

        let found = store.find_matches(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].match_date, 5);
    }

    #[tokio::test]
    async fn test_builds_sorted_and_targets_isolated() {
        let build = |n, day| BuildRecord {
            build_number: n,
            description: String::new(),
            release_date: Utc.with_ymd_and_hms(2024, 9, day, 0, 0, 0).unwrap(),
        };
        let store = MemoryStore::new(vec![], vec![], vec![build(2, 20), build(1, 1)]);

        let builds = store.builds().await.unwrap();
        assert_eq!(builds[0].build_number, 1);

        assert!(store.load_stats("nothing_yet").await.unwrap().is_empty());
        assert!(store.insert_many("", &[]).await.is_err());
    }
}
