//! Integration tests for planning, trigger lifecycle and persistence.
//!
//! These run the same wiring the CLI uses: a SQLite database shared by the
//! event store, the local scheduler and the widget host.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use stillness_core::capability::Capability;
use stillness_core::event::{CountdownEvent, EventDraft, EventPatch};
use stillness_core::notify::{
    CapacityStatus, EventLifecycleCoordinator, MemoryScheduler, NotificationPlanner,
    NotificationPreferences, NotificationScheduler, PermissionState, PlannerSettings,
    SchedulerCall, TriggerKind,
};
use stillness_core::premium::PremiumGate;
use stillness_core::service::{CountdownService, EventBook};
use stillness_core::storage::{
    Database, EventStore, KvWidgetHost, LocalScheduler, SqliteEventStore,
};
use stillness_core::widget::WidgetSync;

fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn event(target: DateTime<Utc>, created: DateTime<Utc>) -> CountdownEvent {
    let draft = EventDraft {
        title: "Harbour".into(),
        target,
        progress_enabled: true,
        ..Default::default()
    };
    CountdownEvent::from_draft(draft, created)
}

type SqliteService = CountdownService<SqliteEventStore, LocalScheduler, KvWidgetHost>;

fn sqlite_service(db: Arc<Database>, limit: usize) -> SqliteService {
    let settings = PlannerSettings {
        capacity: stillness_core::notify::CapacityPolicy {
            limit,
            ..Default::default()
        },
        ..Default::default()
    };
    CountdownService::new(
        EventBook::load(SqliteEventStore::new(db.clone())).unwrap(),
        EventLifecycleCoordinator::new(
            LocalScheduler::new(db.clone()).with_limit(limit),
            NotificationPlanner::new(settings),
        ),
        WidgetSync::new(Capability::Available(KvWidgetHost::new(db))),
        PremiumGate::new(false),
    )
}

#[test]
fn anniversary_rolls_to_next_year_at_local_nine() {
    let e = event(utc(2023, 3, 5, 15), utc(2023, 1, 1, 0));
    let plan = NotificationPlanner::default().plan(
        &e,
        &NotificationPreferences::default(),
        utc(2024, 3, 10, 12),
    );
    let anniversary = plan.get(TriggerKind::Anniversary).unwrap();
    assert_eq!(anniversary.fire_at(), utc(2025, 3, 5, 9));
    assert_eq!(anniversary.dedupe_key, format!("{}-anniversary", e.id));
}

#[tokio::test]
async fn edit_swaps_two_handles_for_two() {
    let now = Utc::now();
    let coordinator =
        EventLifecycleCoordinator::new(MemoryScheduler::new(), NotificationPlanner::default());
    let mut e = event(now + Duration::days(10), now);
    coordinator
        .on_create(&mut e, &NotificationPreferences::all(), now)
        .await;
    let before = e.notification_ids.clone();
    assert_eq!(before.len(), 2);

    e.target = now + Duration::days(20);
    let outcome = coordinator
        .on_update(&mut e, &NotificationPreferences::all(), now)
        .await;

    let calls = coordinator.scheduler().calls();
    let cancels: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, SchedulerCall::Cancel { handle } if before.contains(handle)))
        .map(|(i, _)| i)
        .collect();
    let new_schedules: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            matches!(c, SchedulerCall::Schedule { handle, .. } if outcome.handles.contains(handle))
        })
        .map(|(i, _)| i)
        .collect();
    assert_eq!(cancels.len(), 2);
    assert_eq!(new_schedules.len(), 2);
    assert!(cancels.iter().max() < new_schedules.iter().min());
    assert_eq!(coordinator.scheduler().peak_for(&e.id), 2);
    assert_eq!(coordinator.scheduler().active_for(&e.id), 2);
}

#[tokio::test]
async fn replanning_is_idempotent_in_count() {
    let now = Utc::now();
    let coordinator =
        EventLifecycleCoordinator::new(MemoryScheduler::new(), NotificationPlanner::default());
    let mut e = event(now + Duration::days(3), now);
    coordinator
        .on_create(&mut e, &NotificationPreferences::all(), now)
        .await;
    let count = coordinator.scheduler().scheduled_count();
    for _ in 0..3 {
        coordinator
            .on_update(&mut e, &NotificationPreferences::all(), now)
            .await;
        assert_eq!(coordinator.scheduler().scheduled_count(), count);
    }
}

#[tokio::test]
async fn denied_permission_is_not_an_error() {
    let db = Arc::new(Database::open_memory().unwrap());
    let mut svc = CountdownService::new(
        EventBook::load(SqliteEventStore::new(db.clone())).unwrap(),
        EventLifecycleCoordinator::new(
            LocalScheduler::new(db.clone()).with_permission(false),
            NotificationPlanner::default(),
        ),
        WidgetSync::new(Capability::Available(KvWidgetHost::new(db))),
        PremiumGate::new(false),
    );
    let now = Utc::now();
    let draft = EventDraft {
        title: "Concert".into(),
        target: now + Duration::days(4),
        ..Default::default()
    };
    let (event, outcome) = svc
        .create_event(draft, &NotificationPreferences::all(), now)
        .await
        .unwrap();
    assert_eq!(outcome.permission, PermissionState::Denied);
    assert!(event.notification_ids.is_empty());
    assert_eq!(svc.list().len(), 1);
}

#[tokio::test]
async fn sqlite_wiring_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stillness.db");
    let now = Utc::now();

    let created_id = {
        let db = Arc::new(Database::open_at(&path).unwrap());
        let mut svc = sqlite_service(db, 64);
        let draft = EventDraft {
            title: "Moving day".into(),
            target: now + Duration::days(30),
            progress_enabled: true,
            ..Default::default()
        };
        let (event, _) = svc
            .create_event(draft, &NotificationPreferences::all(), now)
            .await
            .unwrap();
        svc.pin_to_widget(&event.id).unwrap();
        event.id
    };

    let db = Arc::new(Database::open_at(&path).unwrap());
    let store = SqliteEventStore::new(db.clone());
    let events = store.load_all().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].notification_ids.len(), 2);

    let scheduler = LocalScheduler::new(db.clone());
    assert_eq!(scheduler.list_scheduled().await.unwrap(), 2);

    let mut svc = sqlite_service(db, 64);
    assert_eq!(svc.widget_event().map(|e| e.id.clone()), Some(created_id.clone()));
    let patch = EventPatch {
        title: Some("Moving week".into()),
        ..Default::default()
    };
    svc.update_event(&created_id, patch, &NotificationPreferences::all(), now)
        .await
        .unwrap();
    assert_eq!(scheduler.list_scheduled().await.unwrap(), 2);

    svc.delete_event(&created_id).await.unwrap();
    assert_eq!(scheduler.list_scheduled().await.unwrap(), 0);
    assert!(svc.widget().current_event_id().is_none());
}

#[tokio::test]
async fn capacity_limit_is_reported_not_fatal() {
    let db = Arc::new(Database::open_memory().unwrap());
    let mut svc = sqlite_service(db, 3);
    let now = Utc::now();
    let mut statuses = Vec::new();
    for days in [5, 6] {
        let draft = EventDraft {
            title: format!("In {days} days"),
            target: now + Duration::days(days),
            ..Default::default()
        };
        let (_, outcome) = svc
            .create_event(draft, &NotificationPreferences::all(), now)
            .await
            .unwrap();
        statuses.push(outcome.capacity);
    }
    assert_eq!(statuses[0], CapacityStatus::Approaching);
    assert_eq!(statuses[1], CapacityStatus::Exceeded);
    assert_eq!(svc.list().len(), 2);
    let total: usize = svc.list().iter().map(|e| e.notification_ids.len()).sum();
    assert_eq!(total, 3);
}
