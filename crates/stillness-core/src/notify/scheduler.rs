//! Platform notification capability.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::planner::PlannedTrigger;
use crate::error::NotifyError;

/// Whatever actually delivers notifications (OS service, local store, ...).
///
/// Implementations must treat cancelling an unknown, fired or already
/// cancelled handle as success.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Ask for (or confirm) permission to post notifications.
    async fn request_permission(&self) -> bool;

    /// Schedule one trigger and return its opaque handle.
    async fn schedule(&self, trigger: &PlannedTrigger) -> Result<String, NotifyError>;

    async fn cancel(&self, handle: &str) -> Result<(), NotifyError>;

    /// Number of triggers currently scheduled across all events.
    async fn list_scheduled(&self) -> Result<usize, NotifyError>;
}

/// One call observed by [`MemoryScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Permission,
    Schedule { handle: String, event_id: String },
    Cancel { handle: String },
    List,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    scheduled: BTreeMap<String, PlannedTrigger>,
    calls: Vec<SchedulerCall>,
    peak_per_event: HashMap<String, usize>,
}

impl MemoryState {
    fn active_for(&self, event_id: &str) -> usize {
        self.scheduled
            .values()
            .filter(|t| t.event_id == event_id)
            .count()
    }
}

/// In-process scheduler for tests and headless use.
///
/// Records every call and the peak number of simultaneously active triggers
/// per event.
#[derive(Debug)]
pub struct MemoryScheduler {
    permission: bool,
    limit: Option<usize>,
    state: Mutex<MemoryState>,
}

impl Default for MemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self {
            permission: true,
            limit: None,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// A scheduler whose permission prompt is always refused.
    pub fn denied() -> Self {
        Self {
            permission: false,
            ..Self::new()
        }
    }

    /// Reject schedule calls once `limit` triggers are active.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn scheduled(&self) -> Vec<PlannedTrigger> {
        self.lock().scheduled.values().cloned().collect()
    }

    pub fn scheduled_count(&self) -> usize {
        self.lock().scheduled.len()
    }

    pub fn active_for(&self, event_id: &str) -> usize {
        self.lock().active_for(event_id)
    }

    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.lock().calls.clone()
    }

    /// Highest number of triggers this event ever had at once.
    pub fn peak_for(&self, event_id: &str) -> usize {
        self.lock().peak_per_event.get(event_id).copied().unwrap_or(0)
    }

    /// Simulate the platform delivering a one-shot trigger.
    pub fn fire(&self, handle: &str) -> Option<PlannedTrigger> {
        self.lock().scheduled.remove(handle)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // Poisoning only happens if a test panicked mid-call; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NotificationScheduler for MemoryScheduler {
    async fn request_permission(&self) -> bool {
        self.lock().calls.push(SchedulerCall::Permission);
        self.permission
    }

    async fn schedule(&self, trigger: &PlannedTrigger) -> Result<String, NotifyError> {
        if !self.permission {
            return Err(NotifyError::PermissionDenied);
        }
        let mut state = self.lock();
        if let Some(limit) = self.limit {
            if state.scheduled.len() >= limit {
                return Err(NotifyError::CapacityExceeded { limit });
            }
        }
        state.next_id += 1;
        let handle = format!("mem-{}", state.next_id);
        state.scheduled.insert(handle.clone(), trigger.clone());
        state.calls.push(SchedulerCall::Schedule {
            handle: handle.clone(),
            event_id: trigger.event_id.clone(),
        });
        let active = state.active_for(&trigger.event_id);
        let peak = state
            .peak_per_event
            .entry(trigger.event_id.clone())
            .or_insert(0);
        *peak = (*peak).max(active);
        Ok(handle)
    }

    async fn cancel(&self, handle: &str) -> Result<(), NotifyError> {
        let mut state = self.lock();
        state.scheduled.remove(handle);
        state.calls.push(SchedulerCall::Cancel {
            handle: handle.to_string(),
        });
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<usize, NotifyError> {
        let mut state = self.lock();
        state.calls.push(SchedulerCall::List);
        Ok(state.scheduled.len())
    }
}
