//! Reminder planning and trigger lifecycle.

mod coordinator;
mod planner;
mod scheduler;

pub use coordinator::{EventLifecycleCoordinator, FailedTrigger, PermissionState, ScheduleOutcome};
pub use planner::{
    assess_capacity, CapacityPolicy, CapacityStatus, NotificationPlan, NotificationPlanner, NotificationPreferences,
    PlannedTrigger, PlannerSettings, SkipReason, SkippedTrigger, TriggerKind, TriggerSchedule,
    DEFAULT_CAPACITY_LIMIT, DEFAULT_REMINDER_HOUR, DEFAULT_REMINDER_MINUTE, MAX_TRIGGERS_PER_EVENT,
};
pub use scheduler::{MemoryScheduler, NotificationScheduler, SchedulerCall};
