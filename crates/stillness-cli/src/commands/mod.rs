pub mod config;
pub mod countdown;
pub mod event;
pub mod notify;
pub mod premium;
pub mod widget;

use std::convert::Infallible;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use stillness_core::capability::detect;
use stillness_core::notify::{EventLifecycleCoordinator, NotificationPlanner, ScheduleOutcome};
use stillness_core::service::{CountdownService, EventBook};
use stillness_core::storage::{Config, Database, KvWidgetHost, LocalScheduler, SqliteEventStore};
use stillness_core::widget::WidgetSync;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub type CliService = CountdownService<SqliteEventStore, LocalScheduler, KvWidgetHost>;

/// Everything a command needs, wired over one database.
pub struct Context {
    pub config: Config,
    pub db: Arc<Database>,
    pub service: CliService,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);

        let book = EventBook::load(SqliteEventStore::new(db.clone()))?;
        let settings = config.planner_settings();
        let scheduler = LocalScheduler::new(db.clone()).with_limit(settings.capacity.limit);
        let coordinator = EventLifecycleCoordinator::new(scheduler, NotificationPlanner::new(settings));

        let widget_enabled = config.widget.enabled;
        let widget_db = db.clone();
        let widget = WidgetSync::lazy(move || {
            let db = widget_db.clone();
            detect("widget", widget_enabled, move || {
                Ok::<_, Infallible>(Some(KvWidgetHost::new(db)))
            })
        });

        let service = CountdownService::new(book, coordinator, widget, config.premium_gate());
        Ok(Self { config, db, service })
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve_id(&self, query: &str) -> Result<String, Box<dyn std::error::Error>> {
        let matches: Vec<String> = self
            .service
            .list()
            .into_iter()
            .map(|e| e.id)
            .filter(|id| id.starts_with(query))
            .collect();
        match matches.as_slice() {
            [id] => Ok(id.clone()),
            [] => Err(format!("no event matches '{query}'").into()),
            _ if matches.iter().any(|id| id == query) => Ok(query.to_string()),
            _ => Err(format!("'{query}' matches {} events; use more characters", matches.len()).into()),
        }
    }
}

/// Parse `2024-05-01`, `2024-05-01 18:30` (local time) or RFC 3339.
pub fn parse_when(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| format!("cannot parse '{input}' as a date (try 2024-05-01 or 2024-05-01 18:30)"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("'{input}' does not exist in the local time zone"))
}

/// Human summary of a scheduling outcome, written to stderr.
pub fn report_outcome(outcome: &ScheduleOutcome) {
    use stillness_core::notify::{CapacityStatus, PermissionState};

    if outcome.permission == PermissionState::Denied {
        eprintln!("notifications are off; saved without reminders");
    }
    match outcome.capacity {
        CapacityStatus::Ok => {}
        CapacityStatus::Approaching => eprintln!("note: close to the reminder limit"),
        CapacityStatus::Exceeded => eprintln!("warning: reminder limit reached; some reminders were not scheduled"),
    }
    for failed in &outcome.failed {
        eprintln!("  {} reminder not scheduled: {}", failed.kind, failed.error);
    }
}
