//! JSONL (JSON Lines) storage.
//!
//! Every collection is one file with one JSON document per line. Stats
//! targets are appended to for inserts and rewritten for upserts.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{
    merge_upserts, MatchQuery, StatsStore, StorageConfig, StorageError, UpsertOutcome,
};
use crate::models::{AggregateRecord, BuildRecord, Civilization, MatchRecord, RecordId};

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn write_lines(&self, file: File, entities: &[T]) -> Result<usize, StorageError> {
        let mut writer = BufWriter::new(file);
        for entity in entities {
            serde_json::to_writer(&mut writer, entity)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(entities.len())
    }

    /// Append entities to the end of the file.
    pub fn append_batch(&self, entities: &[T]) -> Result<usize, StorageError> {
        if entities.is_empty() {
            return Ok(0);
        }
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let count = self.write_lines(file, entities)?;

        info!("Appended {} entities to {:?}", count, self.path);
        Ok(count)
    }

    /// Replace the file's contents. The new contents are written to a sibling
    /// temp file first and renamed over the old one.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let count = self.write_lines(File::create(&tmp)?, entities)?;
        fs::rename(&tmp, &self.path)?;

        info!("Wrote {} entities to {:?}", count, self.path);
        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read every parseable line. A missing file reads as empty; lines that
    /// fail to parse are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        self.read_where(|_| true)
    }

    /// Read the entities matching a predicate.
    pub fn read_where<F>(&self, predicate: F) -> Result<Vec<T>, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        self.scan(predicate, false)
    }

    /// Read every line, failing on the first one that does not parse.
    /// Used before a file is rewritten so no line is lost in the rewrite.
    pub fn read_strict(&self) -> Result<Vec<T>, StorageError> {
        self.scan(|_| true, true)
    }

    fn scan<F>(&self, predicate: F, strict: bool) -> Result<Vec<T>, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entities = Vec::new();
        let mut skipped = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(&line) {
                Ok(entity) if predicate(&entity) => entities.push(entity),
                Ok(_) => {}
                Err(source) if strict => {
                    return Err(StorageError::UnparseableLine {
                        path: self.path.clone(),
                        line: index + 1,
                        source,
                    });
                }
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping line {} in {:?}: {}", index + 1, self.path, e);
                }
            }
        }

        debug!(
            "Read {} entities from {:?} ({} unparseable)",
            entities.len(),
            self.path,
            skipped
        );
        Ok(entities)
    }
}

/// [`StatsStore`] over the JSONL data lake.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    config: StorageConfig,
}

impl JsonlStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[async_trait]
impl StatsStore for JsonlStore {
    async fn find_matches(&self, query: &MatchQuery) -> Result<Vec<MatchRecord>, StorageError> {
        JsonlReader::new(self.config.matches_path()).read_where(|m| query.matches(m))
    }

    async fn civilizations(&self) -> Result<Vec<Civilization>, StorageError> {
        JsonlReader::new(self.config.civilizations_path()).read_all()
    }

    async fn builds(&self) -> Result<Vec<BuildRecord>, StorageError> {
        let mut builds: Vec<BuildRecord> =
            JsonlReader::new(self.config.builds_path()).read_all()?;
        builds.sort_by_key(|b| b.release_date);
        Ok(builds)
    }

    async fn insert_many(
        &self,
        target: &str,
        records: &[AggregateRecord],
    ) -> Result<usize, StorageError> {
        JsonlWriter::new(self.config.stats_path(target)?).append_batch(records)
    }

    async fn upsert_many(
        &self,
        target: &str,
        records: &[AggregateRecord],
    ) -> Result<UpsertOutcome, StorageError> {
        let path = self.config.stats_path(target)?;
        // The file is rewritten below, so a line we cannot parse must stop
        // the upsert rather than be dropped from the target.
        let mut existing: Vec<AggregateRecord> = JsonlReader::new(path.clone()).read_strict()?;

        let outcome = merge_upserts(&mut existing, records);
        JsonlWriter::new(path).write_all(&existing)?;

        Ok(outcome)
    }

    async fn load_stats(&self, target: &str) -> Result<Vec<AggregateRecord>, StorageError> {
        JsonlReader::new(self.config.stats_path(target)?).read_all()
    }

    async fn existing_ids(
        &self,
        target: &str,
        ids: &HashSet<RecordId>,
    ) -> Result<HashSet<RecordId>, StorageError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<AggregateRecord> = JsonlReader::new(self.config.stats_path(target)?)
            .read_where(|r: &AggregateRecord| ids.contains(&r.id))?;
        Ok(found.into_iter().map(|r| r.id).collect())
    }
}
