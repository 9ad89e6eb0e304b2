//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Which reminders to plan and when they fire
//! - Display defaults for new events
//! - Widget timeline settings
//! - The premium unlock flag
//!
//! Configuration is stored at `~/.config/stillness/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::event::{CountdownFormat, CountdownMode};
use crate::notify::{
    CapacityPolicy, NotificationPreferences, PlannerSettings, DEFAULT_CAPACITY_LIMIT,
    DEFAULT_REMINDER_HOUR, DEFAULT_REMINDER_MINUTE, MAX_TRIGGERS_PER_EVENT,
};
use crate::premium::PremiumGate;
use crate::widget::{DEFAULT_TIMELINE_ENTRIES, DEFAULT_TIMELINE_INTERVAL_SECS};

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub daily: bool,
    #[serde(default = "default_true")]
    pub final_day: bool,
    #[serde(default = "default_true")]
    pub anniversary: bool,
    #[serde(default = "default_reminder_hour")]
    pub reminder_hour: u32,
    #[serde(default = "default_reminder_minute")]
    pub reminder_minute: u32,
    /// Platform cap on concurrently scheduled triggers.
    #[serde(default = "default_capacity_limit")]
    pub capacity_limit: usize,
    #[serde(default = "default_max_per_event")]
    pub max_per_event: usize,
}

/// Display defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Colour theme for the app and widget renderers. Shared config files
    /// carry it; the CLI only round-trips it through `config get/set`.
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub default_mode: CountdownMode,
    #[serde(default)]
    pub default_format: CountdownFormat,
    #[serde(default = "default_true")]
    pub progress_enabled: bool,
}

/// Widget configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeline_entries")]
    pub timeline_entries: usize,
    #[serde(default = "default_timeline_interval_secs")]
    pub timeline_interval_secs: i64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/stillness/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub premium_unlocked: bool,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_reminder_hour() -> u32 {
    DEFAULT_REMINDER_HOUR
}
fn default_reminder_minute() -> u32 {
    DEFAULT_REMINDER_MINUTE
}
fn default_capacity_limit() -> usize {
    DEFAULT_CAPACITY_LIMIT
}
fn default_max_per_event() -> usize {
    MAX_TRIGGERS_PER_EVENT
}
fn default_theme() -> String {
    "dark".into()
}
fn default_timeline_entries() -> usize {
    DEFAULT_TIMELINE_ENTRIES
}
fn default_timeline_interval_secs() -> i64 {
    DEFAULT_TIMELINE_INTERVAL_SECS
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            daily: false,
            final_day: true,
            anniversary: true,
            reminder_hour: DEFAULT_REMINDER_HOUR,
            reminder_minute: DEFAULT_REMINDER_MINUTE,
            capacity_limit: DEFAULT_CAPACITY_LIMIT,
            max_per_event: MAX_TRIGGERS_PER_EVENT,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            default_mode: CountdownMode::default(),
            default_format: CountdownFormat::default(),
            progress_enabled: true,
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeline_entries: DEFAULT_TIMELINE_ENTRIES,
            timeline_interval_secs: DEFAULT_TIMELINE_INTERVAL_SECS,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot set a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the planner cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.notifications;
        if n.reminder_hour >= 24 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.reminder_hour".into(),
                message: format!("{} is not an hour of the day", n.reminder_hour),
            });
        }
        if n.reminder_minute >= 60 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.reminder_minute".into(),
                message: format!("{} is not a minute", n.reminder_minute),
            });
        }
        if n.capacity_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.capacity_limit".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.widget.timeline_interval_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "widget.timeline_interval_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown
    /// or the result does not validate; `self` is untouched on error.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Every leaf key with its current value, in dot-path form.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let path = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&path, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn preferences(&self) -> NotificationPreferences {
        NotificationPreferences {
            daily: self.notifications.daily,
            final_day: self.notifications.final_day,
            anniversary: self.notifications.anniversary,
        }
    }

    pub fn planner_settings(&self) -> PlannerSettings {
        PlannerSettings {
            reminder_hour: self.notifications.reminder_hour,
            reminder_minute: self.notifications.reminder_minute,
            capacity: CapacityPolicy {
                limit: self.notifications.capacity_limit,
                max_per_event: self.notifications.max_per_event,
            },
        }
    }

    pub fn premium_gate(&self) -> PremiumGate {
        PremiumGate::new(self.premium_unlocked)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
