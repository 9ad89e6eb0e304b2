//! Fixed-length duration decomposition.
//!
//! Months are 30 days and years are 365 days. Output must stay reproducible
//! across clients, so this is intentionally not calendar-aware.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::CountdownMode;

pub const SECOND_MS: u64 = 1000;
pub const MINUTE_MS: u64 = 60 * SECOND_MS;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
pub const DAY_MS: u64 = 24 * HOUR_MS;
pub const MONTH_MS: u64 = 30 * DAY_MS;
pub const YEAR_MS: u64 = 365 * DAY_MS;

/// A duration split into calendar-like units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeParts {
    pub years: u64,
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub total_millis: u64,
}

/// Whether the countdown reads "left" or "since".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Since,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Since => "since",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TimeParts {
    /// Decompose an absolute millisecond count.
    pub fn from_millis(total_millis: u64) -> Self {
        Self {
            years: total_millis / YEAR_MS,
            months: (total_millis % YEAR_MS) / MONTH_MS,
            days: (total_millis % MONTH_MS) / DAY_MS,
            hours: (total_millis % DAY_MS) / HOUR_MS,
            minutes: (total_millis % HOUR_MS) / MINUTE_MS,
            seconds: (total_millis % MINUTE_MS) / SECOND_MS,
            total_millis,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_millis / SECOND_MS
    }

    pub fn is_zero(&self) -> bool {
        self.total_millis == 0
    }
}

/// Elapsed parts between two instants, order-independent.
pub fn elapsed_parts(from: DateTime<Utc>, to: DateTime<Utc>) -> TimeParts {
    let diff = (to - from).num_milliseconds().unsigned_abs();
    TimeParts::from_millis(diff)
}

/// Direction label for `mode` at `now`.
pub fn direction_of(mode: CountdownMode, target: DateTime<Utc>, now: DateTime<Utc>) -> Direction {
    match mode {
        CountdownMode::Countdown if target >= now => Direction::Left,
        _ => Direction::Since,
    }
}

/// True while `target` has not been reached.
pub fn is_future(target: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    target >= now
}
