mod config;
pub mod database;
mod event_store;
mod local_scheduler;
pub mod migrations;
mod widget_host;

pub use config::{Config, DisplayConfig, NotificationsConfig, WidgetConfig};
pub use database::{Database, NotificationRow};
pub use event_store::{EventStore, MemoryEventStore, SqliteEventStore, EVENTS_KEY, EVENTS_VERSION};
pub use local_scheduler::LocalScheduler;
pub use widget_host::KvWidgetHost;

use std::path::PathBuf;

/// Returns `~/.config/stillness[-dev]/` based on STILLNESS_ENV.
///
/// Set STILLNESS_ENV=dev to use development data directory, or
/// STILLNESS_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("STILLNESS_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("STILLNESS_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("stillness-dev")
            } else {
                base_dir.join("stillness")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
