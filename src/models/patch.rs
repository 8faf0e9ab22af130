//! Game builds ("patches") and the rollup windows they bound.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// Seconds left between a build's window end and the next build's release.
pub const BUILD_END_GAP_SECS: i64 = 1;

/// A released game build, as stored in the `builds` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub build_number: u64,

    #[serde(default)]
    pub description: String,

    pub release_date: DateTime<Utc>,
}

/// The window a single build's stats are rolled up over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchWindow {
    pub build_number: u64,
    pub description: String,
    pub window: TimeWindow,

    /// Whether this is the latest build (window ends "now")
    pub is_current: bool,
}

impl PatchWindow {
    fn open(build: &BuildRecord, now: DateTime<Utc>) -> Self {
        Self {
            build_number: build.build_number,
            description: build.description.clone(),
            window: TimeWindow::new(build.release_date, now),
            is_current: true,
        }
    }

    /// End this window just before the next build's release.
    fn close_with(&mut self, next: &BuildRecord) {
        self.window.end = next.release_date - Duration::seconds(BUILD_END_GAP_SECS);
        self.is_current = false;
    }
}

/// Ordered, back-to-back windows for every known build.
#[derive(Debug, Default)]
pub struct PatchTimeline {
    windows: Vec<PatchWindow>,
}

impl PatchTimeline {
    /// Build the timeline from builds in any order; the latest build's
    /// window runs until `now`.
    pub fn from_builds(builds: &[BuildRecord], now: DateTime<Utc>) -> Self {
        let mut sorted: Vec<_> = builds.iter().collect();
        sorted.sort_by_key(|b| b.release_date);

        let mut windows: Vec<PatchWindow> = Vec::with_capacity(sorted.len());
        for build in sorted {
            if let Some(prev) = windows.last_mut() {
                prev.close_with(build);
            }
            windows.push(PatchWindow::open(build, now));
        }

        Self { windows }
    }

    /// The most recent build's window.
    pub fn current(&self) -> Option<&PatchWindow> {
        self.windows.last()
    }

    pub fn all(&self) -> &[PatchWindow] {
        &self.windows
    }

}
