//! Pure countdown computations shared by the app, notifications and widget.

mod format;
mod math;
mod progress;
mod ticker;

pub use format::{format_countdown, format_countdown_as, group_thousands, notification_line};
pub use math::{
    direction_of, elapsed_parts, is_future, Direction, TimeParts, DAY_MS, HOUR_MS, MINUTE_MS,
    MONTH_MS, SECOND_MS, YEAR_MS,
};
pub use progress::{progress, progress_percent};
pub use ticker::{CountdownFrame, CountdownTicker, TickerState, TICK_INTERVAL};
