use std::io::Write;

use chrono::Utc;
use clap::Args;
use stillness_core::countdown::{format_countdown, progress, CountdownFrame, CountdownTicker, TICK_INTERVAL};
use stillness_core::event::CountdownFormat;

use super::{CliResult, Context};

#[derive(Args)]
pub struct CountdownArgs {
    /// Event ID (or unique prefix)
    id: String,
    /// Keep refreshing once per second until Ctrl-C
    #[arg(long)]
    watch: bool,
    /// Stop watching after N ticks
    #[arg(long, requires = "watch")]
    ticks: Option<u64>,
    /// Override the event's display format
    #[arg(long)]
    format: Option<CountdownFormat>,
    /// Output frames as JSON lines
    #[arg(long)]
    json: bool,
}

fn bar(fraction: f64) -> String {
    const WIDTH: usize = 20;
    let filled = (fraction * WIDTH as f64).round() as usize;
    format!("[{}{}]", "█".repeat(filled), "·".repeat(WIDTH - filled.min(WIDTH)))
}

fn render(frame: &CountdownFrame, json: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string(frame);
    }
    Ok(match frame.progress {
        Some(p) => format!("{}  {} {:>3.0}%", frame.text, bar(p), p * 100.0),
        None => frame.text.clone(),
    })
}

pub async fn run(args: CountdownArgs) -> CliResult {
    let ctx = Context::open()?;
    let id = ctx.resolve_id(&args.id)?;
    let mut event = ctx.service.get(&id)?.clone();
    if let Some(format) = args.format {
        event.format = format;
    }

    if !args.watch {
        let now = Utc::now();
        if args.json {
            let frame = CountdownTicker::new(event).frame(now);
            println!("{}", serde_json::to_string_pretty(&frame)?);
        } else {
            println!("{} {}", event.emoji.as_deref().unwrap_or(""), event.title);
            let p = event.progress_enabled.then(|| progress(&event, now));
            match p {
                Some(p) => println!("{}  {} {:.0}%", format_countdown(&event, now), bar(p), p * 100.0),
                None => println!("{}", format_countdown(&event, now)),
            }
        }
        return Ok(());
    }

    let mut ticker = CountdownTicker::new(event);
    ticker.start();
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(frame) = ticker.tick(Utc::now()) else { break };
                if args.json {
                    writeln!(stdout, "{}", render(&frame, true)?)?;
                } else {
                    write!(stdout, "\r\x1b[2K{}", render(&frame, false)?)?;
                    if frame.arrived {
                        write!(stdout, "\n{} has arrived.\n", ticker.event().title)?;
                    }
                }
                stdout.flush()?;
                if args.ticks.is_some_and(|limit| ticker.ticks() >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ticker.stop();
    if !args.json {
        writeln!(stdout)?;
    }
    Ok(())
}
