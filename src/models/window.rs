//! Time windows the rollups aggregate over.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving a time window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("Custom range end {end} must be after start {start}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("Custom range requires both start_date and end_date")]
    MissingBounds,
}

/// Half-open `[start, end)` interval in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window covering the UTC calendar day before `now`.
    pub fn previous_utc_day(now: DateTime<Utc>) -> Self {
        let today = start_of_day(now.date_naive());
        Self::new(today - Duration::days(1), today)
    }

    /// `[start 00:00 UTC, end 00:00 UTC)` for explicit calendar dates.
    pub fn custom_range(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if end <= start {
            return Err(WindowError::EmptyRange { start, end });
        }
        Ok(Self::new(start_of_day(start), start_of_day(end)))
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// How the daily rollup picks its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyRange {
    /// Yesterday in UTC relative to the invocation time
    PreviousDay,
    /// Explicit calendar dates, end exclusive
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DailyRange {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeWindow, WindowError> {
        match *self {
            DailyRange::PreviousDay => Ok(TimeWindow::previous_utc_day(now)),
            DailyRange::Custom { start, end } => TimeWindow::custom_range(start, end),
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
