//! Rollup runner.
//!
//! Coordinates one invocation:
//! 1. Resolve the time window(s)
//! 2. Query matches and reference data from the store
//! 3. Run the stats pipeline for each window
//! 4. Insert (daily) or upsert (patch) the records

mod event;

pub use event::*;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::calculate::{PipelineOptions, PipelineOutput, StatsPipeline, TimeBucket};
use crate::config::AppConfig;
use crate::models::{
    CivilizationTable, DailyRange, EloBrackets, MatchRecord, PatchTimeline, PatchWindow,
    TimeWindow, WindowError,
};
use crate::storage::{MatchQuery, StatsStore, StorageError};

/// Errors that can occur during a rollup.
#[derive(Debug, Error)]
pub enum RollupError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("No builds found in the reference data")]
    NoBuilds,
}

/// Settings shared by every rollup of one invocation.
#[derive(Debug, Clone)]
pub struct RollupSettings {
    pub game_mode: String,
    pub brackets: EloBrackets,

    /// Compute everything but skip the write
    pub dry_run: bool,
}

impl RollupSettings {
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Result<Self, crate::config::ConfigError> {
        Ok(Self {
            game_mode: config.game_mode.clone(),
            brackets: config.brackets()?,
            dry_run,
        })
    }
}

/// A daily rollup invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRequest {
    pub target: String,
    pub range: DailyRange,
    pub options: PipelineOptions,
}

/// A patch rollup invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub target: String,

    /// Every known build instead of only the latest
    pub ingest_all: bool,

    pub options: PipelineOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupKind {
    Daily,
    Patch,
}

impl fmt::Display for RollupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollupKind::Daily => write!(f, "daily"),
            RollupKind::Patch => write!(f, "patch"),
        }
    }
}

/// What happened for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub label: String,
    pub window: TimeWindow,
    pub matches: usize,
    pub matches_skipped: usize,
    pub records: usize,
    pub written: usize,
}

/// Result of a rollup run.
#[derive(Debug, Clone)]
pub struct RollupSummary {
    pub kind: RollupKind,
    pub target: String,
    pub windows: Vec<WindowSummary>,

    /// Daily records whose id already existed in the target
    pub duplicates: usize,

    pub dry_run: bool,
    pub duration: Duration,
}

impl RollupSummary {
    pub fn total_records(&self) -> usize {
        self.windows.iter().map(|w| w.records).sum()
    }

    pub fn total_written(&self) -> usize {
        self.windows.iter().map(|w| w.written).sum()
    }
}

/// Runs rollups against a store, one window at a time.
pub struct RollupRunner {
    store: Arc<dyn StatsStore>,
    settings: RollupSettings,
}

impl RollupRunner {
    pub fn new(store: Arc<dyn StatsStore>, settings: RollupSettings) -> Self {
        Self { store, settings }
    }

    /// Roll up one daily window and append the rows to the target.
    ///
    /// Daily inserts are append-only: re-running a day appends a second copy.
    /// Rows whose id already exists in the target are counted and logged.
    pub async fn run_daily(
        &self,
        request: &DailyRequest,
        now: DateTime<Utc>,
    ) -> Result<RollupSummary, RollupError> {
        let start = Instant::now();
        let window = request.range.resolve(now)?;
        info!("Starting daily rollup for {} into {}", window, request.target);

        let civs = self.civilizations().await?;
        let (matches, output) = self
            .compute(&window, TimeBucket::Daily, request.options, &civs)
            .await?;

        let ids: HashSet<_> = output.records.iter().map(|r| r.id.clone()).collect();
        let existing = self.store.existing_ids(&request.target, &ids).await?;
        let duplicates = output
            .records
            .iter()
            .filter(|r| existing.contains(&r.id))
            .count();
        if duplicates > 0 {
            warn!(
                "{} of {} daily records already exist in {}; appending anyway",
                duplicates,
                output.records.len(),
                request.target
            );
        }

        let written = if self.settings.dry_run {
            info!("Dry run: skipping insert of {} records", output.records.len());
            0
        } else {
            self.store
                .insert_many(&request.target, &output.records)
                .await?
        };

        let summary = WindowSummary {
            label: window.start.date_naive().to_string(),
            window,
            matches,
            matches_skipped: output.normalize.matches_skipped,
            records: output.records.len(),
            written,
        };
        info!(
            "Daily rollup complete: {} records from {} matches",
            summary.records, summary.matches
        );

        Ok(RollupSummary {
            kind: RollupKind::Daily,
            target: request.target.clone(),
            windows: vec![summary],
            duplicates,
            dry_run: self.settings.dry_run,
            duration: start.elapsed(),
        })
    }

    /// Roll up the latest build, or every build, upserting by
    /// (civ, bracket, build). Each build's write completes before the next
    /// build is queried.
    pub async fn run_patches(
        &self,
        request: &PatchRequest,
        now: DateTime<Utc>,
    ) -> Result<RollupSummary, RollupError> {
        let start = Instant::now();
        let builds = self.store.builds().await?;
        let timeline = PatchTimeline::from_builds(&builds, now);

        let windows: Vec<&PatchWindow> = if request.ingest_all {
            timeline.all().iter().collect()
        } else {
            timeline.current().into_iter().collect()
        };
        if windows.is_empty() {
            return Err(RollupError::NoBuilds);
        }

        info!(
            "Starting patch rollup for {} build(s) into {}",
            windows.len(),
            request.target
        );

        let civs = self.civilizations().await?;
        let mut summaries = Vec::with_capacity(windows.len());

        for patch in windows {
            info!(
                "Rolling up build {} ({}) over {}",
                patch.build_number, patch.description, patch.window
            );
            let bucket = TimeBucket::Patch {
                build_number: patch.build_number,
            };
            let (matches, output) = self
                .compute(&patch.window, bucket, request.options, &civs)
                .await?;

            let written = if self.settings.dry_run {
                0
            } else {
                let outcome = self
                    .store
                    .upsert_many(&request.target, &output.records)
                    .await?;
                info!(
                    "Build {}: {} records inserted, {} replaced",
                    patch.build_number, outcome.inserted, outcome.replaced
                );
                outcome.inserted + outcome.replaced
            };

            summaries.push(WindowSummary {
                label: patch.build_number.to_string(),
                window: patch.window,
                matches,
                matches_skipped: output.normalize.matches_skipped,
                records: output.records.len(),
                written,
            });
        }

        let summary = RollupSummary {
            kind: RollupKind::Patch,
            target: request.target.clone(),
            windows: summaries,
            duplicates: 0,
            dry_run: self.settings.dry_run,
            duration: start.elapsed(),
        };
        info!(
            "Patch rollup complete: {} records across {} build(s)",
            summary.total_records(),
            summary.windows.len()
        );
        Ok(summary)
    }

    async fn civilizations(&self) -> Result<CivilizationTable, RollupError> {
        let civs = CivilizationTable::new(self.store.civilizations().await?);
        if civs.is_empty() {
            warn!("Civilization reference table is empty; every record will be dropped");
        }
        Ok(civs)
    }

    async fn compute(
        &self,
        window: &TimeWindow,
        bucket: TimeBucket,
        options: PipelineOptions,
        civs: &CivilizationTable,
    ) -> Result<(usize, PipelineOutput), RollupError> {
        let query = MatchQuery::new(self.settings.game_mode.as_str(), window);
        let matches: Vec<MatchRecord> = self.store.find_matches(&query).await?;
        info!("Found {} {} matches in {}", matches.len(), query.game_mode, window);

        let pipeline = StatsPipeline::new(&self.settings.brackets, civs, options);
        let output = pipeline.run(&matches, bucket);
        Ok((matches.len(), output))
    }
}
