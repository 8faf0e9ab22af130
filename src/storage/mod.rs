//! Filesystem data lake operations and the store boundary.
//!
//! Layout under `data_dir`:
//! - `matches.jsonl`: raw match documents
//! - `reference/major_gods.jsonl`, `reference/builds.jsonl`: reference data
//! - `stats/<target>.jsonl`: rolled-up stats collections

mod jsonl;
mod memory;

pub use jsonl::*;
pub use memory::*;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AggregateRecord, BuildRecord, Civilization, MatchRecord, RecordId, TimeWindow, UpsertKey,
};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unparseable line {line} in {path:?}: {source}")]
    UnparseableLine {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn matches_path(&self) -> PathBuf {
        self.data_dir.join("matches.jsonl")
    }

    pub fn reference_dir(&self) -> PathBuf {
        self.data_dir.join("reference")
    }

    pub fn civilizations_path(&self) -> PathBuf {
        self.reference_dir().join("major_gods.jsonl")
    }

    pub fn builds_path(&self) -> PathBuf {
        self.reference_dir().join("builds.jsonl")
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.data_dir.join("stats")
    }

    /// Path of a stats collection. Targets must be plain file stems.
    pub fn stats_path(&self, target: &str) -> Result<PathBuf, StorageError> {
        validate_target(target)?;
        Ok(self.stats_dir().join(format!("{}.jsonl", target)))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Reject target names that would escape the stats directory.
pub fn validate_target(target: &str) -> Result<(), StorageError> {
    let valid = !target.is_empty()
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !target.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(target.to_string()))
    }
}

/// Filter for the match collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    pub game_mode: String,
    /// Inclusive, ms since epoch
    pub start_ms: i64,
    /// Exclusive, ms since epoch
    pub end_ms: i64,
}

impl MatchQuery {
    pub fn new(game_mode: impl Into<String>, window: &TimeWindow) -> Self {
        Self {
            game_mode: game_mode.into(),
            start_ms: window.start_millis(),
            end_ms: window.end_millis(),
        }
    }

    pub fn matches(&self, record: &MatchRecord) -> bool {
        record.game_mode == self.game_mode
            && record.match_date >= self.start_ms
            && record.match_date < self.end_ms
    }
}

/// The document store the rollups read from and write to.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Matches of one game mode inside `[start_ms, end_ms)`.
    async fn find_matches(&self, query: &MatchQuery) -> Result<Vec<MatchRecord>, StorageError>;

    async fn civilizations(&self) -> Result<Vec<Civilization>, StorageError>;

    /// Builds sorted ascending by release date.
    async fn builds(&self) -> Result<Vec<BuildRecord>, StorageError>;

    /// Append records to a target. Returns the number written.
    async fn insert_many(
        &self,
        target: &str,
        records: &[AggregateRecord],
    ) -> Result<usize, StorageError>;

    /// Replace records sharing an upsert key, insert the rest.
    async fn upsert_many(
        &self,
        target: &str,
        records: &[AggregateRecord],
    ) -> Result<UpsertOutcome, StorageError>;

    async fn load_stats(&self, target: &str) -> Result<Vec<AggregateRecord>, StorageError>;

    /// The subset of `ids` already stored in a target.
    async fn existing_ids(
        &self,
        target: &str,
        ids: &HashSet<RecordId>,
    ) -> Result<HashSet<RecordId>, StorageError>;
}

/// Counts from an upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub replaced: usize,
}

/// Merge `incoming` into `existing` by upsert key, keeping `existing` order
/// and appending new keys in the order they arrive.
pub fn merge_upserts(
    existing: &mut Vec<AggregateRecord>,
    incoming: &[AggregateRecord],
) -> UpsertOutcome {
    let mut index: HashMap<UpsertKey, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| (r.upsert_key(), i))
        .collect();

    let mut outcome = UpsertOutcome::default();
    for record in incoming {
        match index.get(&record.upsert_key()) {
            Some(&i) => {
                existing[i] = record.clone();
                outcome.replaced += 1;
            }
            None => {
                index.insert(record.upsert_key(), existing.len());
                existing.push(record.clone());
                outcome.inserted += 1;
            }
        }
    }
    outcome
}
