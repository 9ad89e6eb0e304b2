//! Countdown text rendering.

use chrono::{DateTime, Utc};

use super::math::{direction_of, elapsed_parts, TimeParts};
use crate::event::{CountdownEvent, CountdownFormat};

const PRECISE_SEPARATOR: &str = " · ";

/// Render `event` using its own format.
pub fn format_countdown(event: &CountdownEvent, now: DateTime<Utc>) -> String {
    format_countdown_as(event, event.format, now)
}

/// Render `event` with an explicit format, ignoring `event.format`.
pub fn format_countdown_as(
    event: &CountdownEvent,
    format: CountdownFormat,
    now: DateTime<Utc>,
) -> String {
    let parts = elapsed_parts(event.target, now);
    let direction = direction_of(event.mode, event.target, now);

    match format {
        CountdownFormat::Seconds => {
            format!("{} seconds {direction}", group_thousands(parts.total_seconds()))
        }
        CountdownFormat::Relative => match relative_text(&parts) {
            Some(text) => format!("{text} {direction}"),
            None => "moments".to_string(),
        },
        CountdownFormat::Precise => format!("{} {direction}", precise_text(&parts)),
    }
}

/// One-line summary used in reminder bodies.
pub fn notification_line(event: &CountdownEvent, now: DateTime<Utc>) -> String {
    format_countdown_as(event, CountdownFormat::Relative, now)
}

/// Largest nonzero unit down to minutes, or `None` under a minute.
fn relative_text(parts: &TimeParts) -> Option<String> {
    [
        (parts.years, "year"),
        (parts.months, "month"),
        (parts.days, "day"),
        (parts.hours, "hour"),
        (parts.minutes, "minute"),
    ]
    .into_iter()
    .find(|(value, _)| *value > 0)
    .map(|(value, unit)| plural(value, unit))
}

fn precise_text(parts: &TimeParts) -> String {
    let mut segments: Vec<String> = [
        (parts.years, "year"),
        (parts.months, "month"),
        (parts.days, "day"),
    ]
    .into_iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, unit)| plural(value, unit))
    .collect();

    segments.push(format!(
        "{:02}h {:02}m {:02}s",
        parts.hours, parts.minutes, parts.seconds
    ));
    segments.join(PRECISE_SEPARATOR)
}

fn plural(value: u64, unit: &str) -> String {
    if value == 1 {
        format!("{value} {unit}")
    } else {
        format!("{value} {unit}s")
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
