//! Progress fraction between creation and target.

use chrono::{DateTime, Utc};

use crate::event::{CountdownEvent, CountdownMode};

/// 0.0 .. 1.0 progress of `event` at `now`.
///
/// Never fails: disabled progress is 0, a target at or before creation is
/// treated as already arrived.
pub fn progress(event: &CountdownEvent, now: DateTime<Utc>) -> f64 {
    if !event.progress_enabled {
        return 0.0;
    }

    if let Some(value) = event.progress_override {
        return clamp_unit(value);
    }

    if event.mode == CountdownMode::Countup && event.target <= now {
        return 1.0;
    }

    let total = (event.target - event.created_at).num_milliseconds();
    if total <= 0 {
        return 1.0;
    }

    let elapsed = (now - event.created_at).num_milliseconds().clamp(0, total);
    elapsed as f64 / total as f64
}

/// Whole-percent rendering used by progress bars.
pub fn progress_percent(event: &CountdownEvent, now: DateTime<Utc>) -> u8 {
    (progress(event, now) * 100.0).round() as u8
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
