use chrono::{Duration, Local, Utc};
use clap::Subcommand;
use stillness_core::widget::build_timeline;

use super::{CliResult, Context};

#[derive(Subcommand)]
pub enum WidgetAction {
    /// Show an event on the home-screen widget
    Pin {
        /// Event ID (or unique prefix)
        id: String,
    },
    /// Print the payload the widget currently reads
    Show,
    /// Remove the event from the widget
    Clear,
    /// Print the widget's upcoming timeline entries
    Timeline {
        /// Number of entries (defaults to widget.timeline_entries)
        #[arg(long)]
        entries: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: WidgetAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        WidgetAction::Pin { id } => {
            let id = ctx.resolve_id(&id)?;
            ctx.service.pin_to_widget(&id)?;
            println!("Widget now shows {id}");
        }
        WidgetAction::Show => match ctx.service.widget().current_payload()? {
            Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
            None => println!("Widget is empty."),
        },
        WidgetAction::Clear => {
            ctx.service.clear_widget()?;
            println!("Widget cleared");
        }
        WidgetAction::Timeline { entries, json } => {
            let Some(payload) = ctx.service.widget().current_payload()? else {
                println!("Widget is empty.");
                return Ok(());
            };
            let entries = entries.unwrap_or(ctx.config.widget.timeline_entries);
            let interval = Duration::seconds(ctx.config.widget.timeline_interval_secs);
            let timeline = build_timeline(&payload, Utc::now(), entries, interval);
            if json {
                println!("{}", serde_json::to_string_pretty(&timeline)?);
                return Ok(());
            }
            for entry in &timeline {
                let at = entry.at.with_timezone(&Local).format("%H:%M:%S");
                match entry.progress {
                    Some(p) => println!("{at}  {:<24} {:>3.0}%", entry.text, p * 100.0),
                    None => println!("{at}  {}", entry.text),
                }
            }
        }
    }
    Ok(())
}
