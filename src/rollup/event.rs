//! JSON invocation payloads, as sent by the scheduler.
//!
//! ```json
//! {"target": "daily_civ_stats", "ingest_custom_range": true,
//!  "start_date": "08/26/2024", "end_date": "09/11/2024"}
//! ```

use serde::{Deserialize, Serialize};

use super::{DailyRequest, PatchRequest, RollupError};
use crate::calculate::PipelineOptions;
use crate::config::{DailyConfig, PatchConfig};
use crate::models::{DailyRange, TimeWindow, WindowError};
use crate::parse_calendar_date;

/// Recognized invocation options. Absent fields take the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub ingest_custom_range: bool,

    /// `MM/DD/YYYY` or `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// Exclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    #[serde(default)]
    pub ingest_all: bool,
}

impl RollupEvent {
    pub fn from_json(payload: &str) -> Result<Self, RollupError> {
        serde_json::from_str(payload).map_err(|e| RollupError::InvalidEvent(e.to_string()))
    }

    /// The daily window requested. Dates are only read when a custom range
    /// is asked for.
    pub fn daily_range(&self) -> Result<DailyRange, RollupError> {
        if !self.ingest_custom_range {
            return Ok(DailyRange::PreviousDay);
        }

        let (start, end) = match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => (parse_date(start)?, parse_date(end)?),
            _ => return Err(WindowError::MissingBounds.into()),
        };
        TimeWindow::custom_range(start, end)?;
        Ok(DailyRange::Custom { start, end })
    }

    pub fn daily_request(&self, defaults: &DailyConfig) -> Result<DailyRequest, RollupError> {
        Ok(DailyRequest {
            target: self.target_or(&defaults.target)?,
            range: self.daily_range()?,
            options: PipelineOptions {
                breakdowns: defaults.breakdowns,
                all_elo: defaults.all_elo,
            },
        })
    }

    pub fn patch_request(&self, defaults: &PatchConfig) -> Result<PatchRequest, RollupError> {
        Ok(PatchRequest {
            target: self.target_or(&defaults.target)?,
            ingest_all: self.ingest_all,
            options: PipelineOptions {
                breakdowns: defaults.breakdowns,
                all_elo: defaults.all_elo,
            },
        })
    }

    fn target_or(&self, default: &str) -> Result<String, RollupError> {
        let target = self.target.as_deref().unwrap_or(default);
        crate::storage::validate_target(target)
            .map_err(|_| RollupError::InvalidEvent(format!("invalid target {:?}", target)))?;
        Ok(target.to_string())
    }
}

fn parse_date(value: &str) -> Result<chrono::NaiveDate, RollupError> {
    parse_calendar_date(value)
        .ok_or_else(|| RollupError::InvalidEvent(format!("unrecognized date {:?}", value)))
}
