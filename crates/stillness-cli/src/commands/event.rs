use chrono::{Local, Utc};
use clap::Subcommand;
use stillness_core::countdown::{format_countdown, progress_percent};
use stillness_core::event::{CountdownEvent, CountdownFormat, CountdownMode, EventDraft, EventPatch, Mood};

use super::{parse_when, report_outcome, CliResult, Context};

#[derive(Subcommand)]
pub enum EventAction {
    /// Create an event
    Add {
        /// Event title
        title: String,
        /// Target date: 2024-05-01, "2024-05-01 18:30" or RFC 3339
        #[arg(long)]
        date: String,
        /// countdown or countup (defaults to display.default_mode)
        #[arg(long)]
        mode: Option<CountdownMode>,
        /// relative, precise or seconds (defaults to display.default_format)
        #[arg(long)]
        format: Option<CountdownFormat>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        quote: Option<String>,
        /// Hopeful, Melancholy, Peaceful or Silent
        #[arg(long, default_value = "Hopeful")]
        mood: Mood,
        /// Background colour, e.g. "#1f2937"
        #[arg(long)]
        color: Option<String>,
        /// Background image reference (premium)
        #[arg(long)]
        image: Option<String>,
        /// Pin to the top of the list
        #[arg(long)]
        pin: bool,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List events, pinned first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one event
    Show {
        /// Event ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an event and reschedule its reminders
    Edit {
        /// Event ID (or unique prefix)
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        mode: Option<CountdownMode>,
        #[arg(long)]
        format: Option<CountdownFormat>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        quote: Option<String>,
        #[arg(long)]
        mood: Option<Mood>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        image: Option<String>,
        /// Show or hide the progress bar
        #[arg(long)]
        progress: Option<bool>,
        /// Set progress manually (0.0 - 1.0)
        #[arg(long, conflicts_with = "clear_override")]
        progress_override: Option<f64>,
        /// Go back to time-based progress
        #[arg(long)]
        clear_override: bool,
    },
    /// Delete an event and cancel its reminders
    Delete {
        /// Event ID (or unique prefix)
        id: String,
    },
    /// Toggle the pinned flag
    Pin {
        /// Event ID (or unique prefix)
        id: String,
    },
}

fn print_event(event: &CountdownEvent) {
    let now = Utc::now();
    let pin = if event.pinned { "📌 " } else { "" };
    println!("{pin}{} {}", event.emoji.as_deref().unwrap_or(" "), event.title);
    println!("  id:        {}", event.id);
    println!("  target:    {}", event.target.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    println!("  mode:      {}  format: {}  mood: {}", event.mode.as_str(), event.format.as_str(), event.mood.as_str());
    println!("  countdown: {}", format_countdown(event, now));
    if event.progress_enabled {
        println!("  progress:  {}%", progress_percent(event, now));
    }
    println!("  quote:     {}", event.quote_or_default());
    println!("  reminders: {}", event.notification_ids.len());
}

/// Treat an empty string as "clear this field".
fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.trim().is_empty() { None } else { Some(v) })
}

pub async fn run(action: EventAction) -> CliResult {
    let mut ctx = Context::open()?;
    let prefs = ctx.config.preferences();

    match action {
        EventAction::Add {
            title,
            date,
            mode,
            format,
            emoji,
            quote,
            mood,
            color,
            image,
            pin,
            no_progress,
            json,
        } => {
            let display = &ctx.config.display;
            let draft = EventDraft {
                title,
                emoji,
                target: parse_when(&date)?,
                mode: mode.unwrap_or(display.default_mode),
                format: format.unwrap_or(display.default_format),
                quote,
                mood,
                pinned: pin,
                background_color: color,
                background_image: image,
                progress_enabled: display.progress_enabled && !no_progress,
            };
            let (event, outcome) = ctx.service.create_event(draft, &prefs, Local::now()).await?;
            report_outcome(&outcome);
            if json {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("Event created: {}", event.id);
                print_event(&event);
            }
        }
        EventAction::List { json } => {
            let events = ctx.service.list();
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No events.");
            } else {
                let now = Utc::now();
                for event in &events {
                    let pin = if event.pinned { "*" } else { " " };
                    let short: String = event.id.chars().take(8).collect();
                    println!("{pin} {short}  {:<28} {}", event.title, format_countdown(event, now));
                }
            }
        }
        EventAction::Show { id, json } => {
            let id = ctx.resolve_id(&id)?;
            let event = ctx.service.get(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(event)?);
            } else {
                print_event(event);
            }
        }
        EventAction::Edit {
            id,
            title,
            date,
            mode,
            format,
            emoji,
            quote,
            mood,
            color,
            image,
            progress,
            progress_override,
            clear_override,
        } => {
            let id = ctx.resolve_id(&id)?;
            let patch = EventPatch {
                title,
                emoji: clearable(emoji),
                target: date.as_deref().map(parse_when).transpose()?,
                mode,
                format,
                quote: clearable(quote),
                mood,
                background_color: clearable(color),
                background_image: clearable(image),
                progress_enabled: progress,
                progress_override: if clear_override {
                    Some(None)
                } else {
                    progress_override.map(Some)
                },
            };
            let (event, outcome) = ctx.service.update_event(&id, patch, &prefs, Local::now()).await?;
            report_outcome(&outcome);
            println!("Event updated: {}", event.id);
            print_event(&event);
        }
        EventAction::Delete { id } => {
            let id = ctx.resolve_id(&id)?;
            let cancelled = ctx.service.delete_event(&id).await?;
            println!("Event deleted: {id} ({cancelled} reminders cancelled)");
        }
        EventAction::Pin { id } => {
            let id = ctx.resolve_id(&id)?;
            let pinned = ctx.service.toggle_pin(&id)?;
            println!("{}", if pinned { "pinned" } else { "unpinned" });
        }
    }
    Ok(())
}
