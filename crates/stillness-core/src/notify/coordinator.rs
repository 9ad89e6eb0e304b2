//! Event lifecycle coordination for notification triggers.
//!
//! An event owns at most one live set of trigger handles. Every path that
//! produces a new set cancels the previous one first, and each cancel is
//! awaited before the next schedule call is issued.
//!
//! Scheduling never fails the surrounding event operation: permission
//! refusal and capacity problems are logged and reported in the returned
//! [`ScheduleOutcome`].

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::planner::{
    CapacityStatus, NotificationPlanner, NotificationPreferences, SkippedTrigger, TriggerKind,
};
use super::scheduler::NotificationScheduler;
use crate::error::NotifyError;
use crate::event::CountdownEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTrigger {
    pub kind: TriggerKind,
    pub error: String,
}

/// What happened to one event's triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleOutcome {
    /// Handles now attached to the event.
    pub handles: Vec<String>,
    /// Number of previous handles cancelled first.
    pub cancelled: usize,
    pub permission: PermissionState,
    pub capacity: CapacityStatus,
    pub skipped: Vec<SkippedTrigger>,
    pub failed: Vec<FailedTrigger>,
}

impl ScheduleOutcome {
    /// True when every planned trigger was scheduled.
    pub fn is_complete(&self) -> bool {
        self.permission == PermissionState::Granted && self.failed.is_empty()
    }
}

pub struct EventLifecycleCoordinator<S> {
    scheduler: S,
    planner: NotificationPlanner,
}

impl<S: NotificationScheduler> EventLifecycleCoordinator<S> {
    pub fn new(scheduler: S, planner: NotificationPlanner) -> Self {
        Self { scheduler, planner }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn planner(&self) -> &NotificationPlanner {
        &self.planner
    }

    /// Schedule triggers for a freshly created event and attach the handles.
    ///
    /// Stray handles on the record (e.g. a duplicated event) are cancelled
    /// first so they cannot outlive it.
    pub async fn on_create<Tz: TimeZone>(
        &self,
        event: &mut CountdownEvent,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> ScheduleOutcome {
        let cancelled = if event.notification_ids.is_empty() {
            0
        } else {
            debug!(event_id = %event.id, "new event carries handles; cancelling them");
            self.detach_all(event).await
        };
        let mut outcome = self.schedule_plan(event, preferences, now).await;
        outcome.cancelled = cancelled;
        outcome
    }

    /// Replace the event's triggers after an edit.
    ///
    /// All existing handles are cancelled before the new plan is computed.
    pub async fn on_update<Tz: TimeZone>(
        &self,
        event: &mut CountdownEvent,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> ScheduleOutcome {
        let cancelled = self.detach_all(event).await;
        let mut outcome = self.schedule_plan(event, preferences, now).await;
        outcome.cancelled = cancelled;
        outcome
    }

    /// Cancel every handle of a deleted event. Returns the number of cancel
    /// calls issued; the caller drops the record afterwards.
    pub async fn on_delete(&self, event_id: &str, handles: &[String]) -> usize {
        let count = self.cancel_handles(event_id, handles).await;
        info!(event_id, cancelled = count, "cancelled triggers for deleted event");
        count
    }

    async fn detach_all(&self, event: &mut CountdownEvent) -> usize {
        let handles = std::mem::take(&mut event.notification_ids);
        self.cancel_handles(&event.id, &handles).await
    }

    async fn cancel_handles(&self, event_id: &str, handles: &[String]) -> usize {
        for handle in handles {
            if let Err(err) = self.scheduler.cancel(handle).await {
                // The trigger is gone from our records either way.
                warn!(event_id, handle = %handle, error = %err, "failed to cancel trigger");
            }
        }
        handles.len()
    }

    async fn schedule_plan<Tz: TimeZone>(
        &self,
        event: &mut CountdownEvent,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();

        let plan = self.planner.plan(event, preferences, now);
        outcome.skipped = plan.skipped.clone();
        if plan.is_empty() {
            debug!(event_id = %event.id, "nothing to schedule");
            return outcome;
        }

        if !self.scheduler.request_permission().await {
            warn!(event_id = %event.id, "notification permission denied; saving without reminders");
            outcome.permission = PermissionState::Denied;
            return outcome;
        }

        let policy = self.planner.capacity();
        match self.scheduler.list_scheduled().await {
            Ok(current) => {
                outcome.capacity = policy.assess(current, plan.len());
                if outcome.capacity != CapacityStatus::Ok {
                    warn!(
                        event_id = %event.id,
                        scheduled = current,
                        limit = policy.limit,
                        "notification limit approaching; some reminders may not be scheduled"
                    );
                }
            }
            Err(err) => warn!(event_id = %event.id, error = %err, "could not count scheduled triggers"),
        }

        for trigger in &plan.triggers {
            match self.scheduler.schedule(trigger).await {
                Ok(handle) => {
                    debug!(event_id = %event.id, kind = %trigger.kind, handle = %handle, fire_at = %trigger.fire_at(), "scheduled trigger");
                    outcome.handles.push(handle);
                }
                Err(NotifyError::PermissionDenied) => {
                    warn!(event_id = %event.id, "permission revoked while scheduling");
                    outcome.permission = PermissionState::Denied;
                    break;
                }
                Err(err) => {
                    if matches!(err, NotifyError::CapacityExceeded { .. }) {
                        outcome.capacity = CapacityStatus::Exceeded;
                    }
                    warn!(event_id = %event.id, kind = %trigger.kind, error = %err, "failed to schedule trigger");
                    outcome.failed.push(FailedTrigger {
                        kind: trigger.kind,
                        error: err.to_string(),
                    });
                }
            }
        }

        if let Ok(total) = self.scheduler.list_scheduled().await {
            if total >= policy.limit {
                warn!(scheduled = total, limit = policy.limit, "notification limit reached");
                outcome.capacity = outcome.capacity.max(CapacityStatus::Approaching);
            }
        }

        event.set_notification_ids(outcome.handles.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use crate::notify::scheduler::{MemoryScheduler, SchedulerCall};
    use chrono::{Duration, Utc};

    fn event_in(days: i64, now: DateTime<Utc>) -> CountdownEvent {
        let draft = EventDraft {
            title: "Trip".into(),
            target: now + Duration::days(days),
            progress_enabled: true,
            ..Default::default()
        };
        CountdownEvent::from_draft(draft, now)
    }

    fn coordinator(scheduler: MemoryScheduler) -> EventLifecycleCoordinator<MemoryScheduler> {
        EventLifecycleCoordinator::new(scheduler, NotificationPlanner::default())
    }

    fn prefs() -> NotificationPreferences {
        NotificationPreferences {
            daily: true,
            final_day: true,
            anniversary: true,
        }
    }

    #[tokio::test]
    async fn create_attaches_handles() {
        let now = Utc::now();
        let c = coordinator(MemoryScheduler::new());
        let mut event = event_in(5, now);
        let outcome = c.on_create(&mut event, &prefs(), now).await;
        assert_eq!(outcome.handles.len(), 2);
        assert_eq!(event.notification_ids, outcome.handles);
        assert_eq!(c.scheduler().active_for(&event.id), 2);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn update_cancels_before_scheduling() {
        let now = Utc::now();
        let c = coordinator(MemoryScheduler::new());
        let mut event = event_in(5, now);
        c.on_create(&mut event, &prefs(), now).await;
        let old = event.notification_ids.clone();

        event.target = now + Duration::days(9);
        let outcome = c.on_update(&mut event, &prefs(), now).await;
        assert_eq!(outcome.cancelled, 2);
        assert_eq!(event.notification_ids.len(), 2);
        assert!(event.notification_ids.iter().all(|h| !old.contains(h)));
        assert_eq!(c.scheduler().peak_for(&event.id), 2);

        let calls = c.scheduler().calls();
        let last_cancel = calls
            .iter()
            .rposition(|call| matches!(call, SchedulerCall::Cancel { .. }))
            .unwrap();
        let schedules: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, SchedulerCall::Schedule { .. }))
            .map(|(i, _)| i)
            .collect();
        assert!(schedules[2..].iter().all(|&i| i > last_cancel));
    }

    #[tokio::test]
    async fn denied_permission_saves_without_triggers() {
        let now = Utc::now();
        let c = coordinator(MemoryScheduler::denied());
        let mut event = event_in(5, now);
        let outcome = c.on_create(&mut event, &prefs(), now).await;
        assert_eq!(outcome.permission, PermissionState::Denied);
        assert!(event.notification_ids.is_empty());
        assert_eq!(c.scheduler().scheduled_count(), 0);
    }

    #[tokio::test]
    async fn capacity_is_best_effort() {
        let now = Utc::now();
        let c = coordinator(MemoryScheduler::new().with_limit(1));
        let mut event = event_in(5, now);
        let outcome = c.on_create(&mut event, &prefs(), now).await;
        assert_eq!(outcome.handles.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.capacity, CapacityStatus::Exceeded);
        assert_eq!(event.notification_ids.len(), 1);
    }

    #[tokio::test]
    async fn delete_cancels_everything_and_tolerates_fired_handles() {
        let now = Utc::now();
        let c = coordinator(MemoryScheduler::new());
        let mut event = event_in(5, now);
        c.on_create(&mut event, &prefs(), now).await;
        c.scheduler().fire(&event.notification_ids[0]);

        let cancelled = c.on_delete(&event.id, &event.notification_ids).await;
        assert_eq!(cancelled, 2);
        assert_eq!(c.scheduler().active_for(&event.id), 0);
    }

    #[tokio::test]
    async fn past_event_without_anniversary_schedules_nothing() {
        let now = Utc::now();
        let c = coordinator(MemoryScheduler::new());
        let mut event = event_in(-3, now);
        let prefs = NotificationPreferences {
            anniversary: false,
            ..prefs()
        };
        let outcome = c.on_create(&mut event, &prefs, now).await;
        assert!(outcome.handles.is_empty());
        assert_eq!(outcome.skipped.len(), 3);
        // No permission prompt for an empty plan.
        assert!(c.scheduler().calls().is_empty());
    }
}
