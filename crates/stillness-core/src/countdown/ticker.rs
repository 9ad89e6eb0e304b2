//! Live countdown driver.
//!
//! Like a wall-clock timer, the ticker owns no thread. The caller invokes
//! `tick()` once per [`TICK_INTERVAL`]; each frame is re-derived from the
//! event and `now`, so a late or skipped tick never drifts.
//!
//! ```text
//! Idle -> Running -> Stopped
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::format_countdown;
use super::math::{direction_of, is_future, Direction};
use super::progress::progress;
use crate::event::CountdownEvent;

/// Refresh period for live countdown displays.
pub const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerState {
    Idle,
    Running,
    Stopped,
}

/// Everything a countdown view shows at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownFrame {
    pub event_id: String,
    pub text: String,
    /// `None` when the event hides its progress bar.
    pub progress: Option<f64>,
    pub direction: Direction,
    pub is_future: bool,
    /// Set on the first frame after the target was crossed.
    pub arrived: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CountdownTicker {
    event: CountdownEvent,
    state: TickerState,
    last_direction: Option<Direction>,
    ticks: u64,
}

impl CountdownTicker {
    pub fn new(event: CountdownEvent) -> Self {
        Self {
            event,
            state: TickerState::Idle,
            last_direction: None,
            ticks: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn event(&self) -> &CountdownEvent {
        &self.event
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Frame for `now` without touching ticker state.
    pub fn frame(&self, now: DateTime<Utc>) -> CountdownFrame {
        let event = &self.event;
        CountdownFrame {
            event_id: event.id.clone(),
            text: format_countdown(event, now),
            progress: event.progress_enabled.then(|| progress(event, now)),
            direction: direction_of(event.mode, event.target, now),
            is_future: is_future(event.target, now),
            arrived: false,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) {
        if self.state != TickerState::Running {
            self.state = TickerState::Running;
            self.last_direction = None;
        }
    }

    /// Stop on view teardown. Further ticks are ignored.
    pub fn stop(&mut self) {
        self.state = TickerState::Stopped;
    }

    /// Swap the displayed event after an edit.
    pub fn set_event(&mut self, event: CountdownEvent) {
        self.event = event;
        self.last_direction = None;
    }

    /// Call once per tick. Returns `None` unless running.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<CountdownFrame> {
        if self.state != TickerState::Running {
            return None;
        }
        let mut frame = self.frame(now);
        frame.arrived = matches!(
            (self.last_direction, frame.direction),
            (Some(Direction::Left), Direction::Since)
        );
        self.last_direction = Some(frame.direction);
        self.ticks += 1;
        Some(frame)
    }
}
