use chrono::Local;
use clap::Subcommand;
use stillness_core::notify::{NotificationScheduler, SkipReason};
use stillness_core::storage::LocalScheduler;

use super::{report_outcome, CliResult, Context};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Show the reminders an event would get now, without scheduling
    Plan {
        /// Event ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List scheduled reminders
    List {
        /// Only reminders for this event
        #[arg(long)]
        event: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel and recreate reminders for every event
    Reschedule,
}

fn skip_text(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Disabled => "turned off",
        SkipReason::EventInPast => "event has passed",
        SkipReason::EventInFuture => "event has not happened yet",
        SkipReason::NoValidTime => "no valid local time",
    }
}

pub async fn run(action: NotifyAction) -> CliResult {
    let mut ctx = Context::open()?;
    let prefs = ctx.config.preferences();

    match action {
        NotifyAction::Plan { id, json } => {
            let id = ctx.resolve_id(&id)?;
            let event = ctx.service.get(&id)?;
            let plan = ctx.service.coordinator().planner().plan(event, &prefs, Local::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }
            for trigger in &plan.triggers {
                let when = trigger.fire_at().with_timezone(&Local).format("%Y-%m-%d %H:%M");
                let repeat = if trigger.schedule.repeats() { " (repeats)" } else { "" };
                println!("{:<12} {when}{repeat}", trigger.kind.as_str());
                println!("             {}: {}", trigger.title, trigger.body);
            }
            for skipped in &plan.skipped {
                println!("{:<12} skipped: {}", skipped.kind.as_str(), skip_text(skipped.reason));
            }
        }
        NotifyAction::List { event, json } => {
            let event_id = event.map(|q| ctx.resolve_id(&q)).transpose()?;
            let scheduler = LocalScheduler::new(ctx.db.clone());
            let rows = scheduler.pending(event_id.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("No reminders scheduled.");
            }
            for row in &rows {
                let when = row.fire_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
                println!("{when}  {:<12} {}  {}", row.kind.as_str(), row.title, row.body);
            }
            let total = scheduler.list_scheduled().await?;
            eprintln!("{total} of {} reminder slots used", ctx.config.notifications.capacity_limit);
        }
        NotifyAction::Reschedule => {
            let outcomes = ctx.service.reschedule_all(&prefs, Local::now()).await?;
            let mut scheduled = 0;
            for (_, outcome) in &outcomes {
                scheduled += outcome.handles.len();
                report_outcome(outcome);
            }
            println!("Rescheduled {} events ({scheduled} reminders)", outcomes.len());
        }
    }
    Ok(())
}
