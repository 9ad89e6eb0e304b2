//! Countdown event model.
//!
//! Field names serialize in camelCase because the same records are read by
//! the widget renderer and by older stores written from the mobile client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the target instant is approached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CountdownMode {
    /// Target is a future point approached from `created_at`.
    #[default]
    Countdown,
    /// Target is a past point receding indefinitely.
    Countup,
}

/// Rendering granularity for countdown text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CountdownFormat {
    #[default]
    Relative,
    Precise,
    Seconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mood {
    #[default]
    Hopeful,
    Melancholy,
    Peaceful,
    Silent,
}

impl CountdownMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Countdown => "countdown",
            Self::Countup => "countup",
        }
    }
}

impl CountdownFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relative => "relative",
            Self::Precise => "precise",
            Self::Seconds => "seconds",
        }
    }
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Hopeful, Mood::Melancholy, Mood::Peaceful, Mood::Silent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hopeful => "Hopeful",
            Self::Melancholy => "Melancholy",
            Self::Peaceful => "Peaceful",
            Self::Silent => "Silent",
        }
    }
}

impl std::str::FromStr for CountdownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "countdown" => Ok(Self::Countdown),
            "countup" | "count-up" => Ok(Self::Countup),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl std::str::FromStr for CountdownFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" => Ok(Self::Relative),
            "precise" => Ok(Self::Precise),
            "seconds" => Ok(Self::Seconds),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

impl std::str::FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown mood: {s}"))
    }
}

/// A named moment the user counts towards or away from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownEvent {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(rename = "dateTime", with = "iso_millis")]
    pub target: DateTime<Utc>,
    #[serde(default)]
    pub mode: CountdownMode,
    #[serde(default)]
    pub format: CountdownFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub progress_enabled: bool,
    /// Manually set progress, takes precedence over elapsed time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_override: Option<f64>,
    #[serde(default)]
    pub premium_feature_used: bool,
    /// Trigger handles currently scheduled for this event.
    #[serde(default)]
    pub notification_ids: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// User-supplied fields for a new event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub emoji: Option<String>,
    #[serde(rename = "dateTime", with = "iso_millis")]
    pub target: DateTime<Utc>,
    pub mode: CountdownMode,
    pub format: CountdownFormat,
    pub quote: Option<String>,
    pub mood: Mood,
    pub pinned: bool,
    pub background_color: Option<String>,
    pub background_image: Option<String>,
    pub progress_enabled: bool,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub emoji: Option<Option<String>>,
    pub target: Option<DateTime<Utc>>,
    pub mode: Option<CountdownMode>,
    pub format: Option<CountdownFormat>,
    pub quote: Option<Option<String>>,
    pub mood: Option<Mood>,
    pub background_color: Option<Option<String>>,
    pub background_image: Option<Option<String>>,
    pub progress_enabled: Option<bool>,
    pub progress_override: Option<Option<f64>>,
}

impl CountdownEvent {
    /// Build a new event from a draft, assigning a fresh id and `created_at`.
    pub fn from_draft(draft: EventDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title.trim().to_string(),
            emoji: draft.emoji,
            target: draft.target,
            mode: draft.mode,
            format: draft.format,
            quote: draft.quote.filter(|q| !q.trim().is_empty()),
            mood: draft.mood,
            pinned: draft.pinned,
            background_color: draft.background_color,
            background_image: draft.background_image,
            created_at: now,
            progress_enabled: draft.progress_enabled,
            progress_override: None,
            premium_feature_used: false,
            notification_ids: Vec::new(),
        }
    }

    /// Apply a patch in place.
    ///
    /// Returns true when a field that feeds notification content or timing
    /// changed.
    pub fn apply(&mut self, patch: EventPatch) -> bool {
        let mut schedule_dirty = false;
        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            schedule_dirty |= title != self.title;
            self.title = title;
        }
        if let Some(emoji) = patch.emoji {
            self.emoji = emoji;
        }
        if let Some(target) = patch.target {
            schedule_dirty |= target != self.target;
            self.target = target;
        }
        if let Some(mode) = patch.mode {
            schedule_dirty |= mode != self.mode;
            self.mode = mode;
        }
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(quote) = patch.quote {
            schedule_dirty |= quote != self.quote;
            self.quote = quote;
        }
        if let Some(mood) = patch.mood {
            self.mood = mood;
        }
        if let Some(color) = patch.background_color {
            self.background_color = color;
        }
        if let Some(image) = patch.background_image {
            self.background_image = image;
        }
        if let Some(enabled) = patch.progress_enabled {
            self.progress_enabled = enabled;
        }
        if let Some(value) = patch.progress_override {
            self.progress_override = value;
        }
        schedule_dirty
    }

    /// Quote used in notification bodies.
    pub fn quote_or_default(&self) -> &str {
        self.quote
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(DEFAULT_QUOTE)
    }

    /// Replace the handle set, dropping duplicates while keeping order.
    pub fn set_notification_ids(&mut self, handles: Vec<String>) {
        let mut ids: Vec<String> = Vec::with_capacity(handles.len());
        for handle in handles {
            if !ids.contains(&handle) {
                ids.push(handle);
            }
        }
        self.notification_ids = ids;
    }
}

/// Fallback quote for notification bodies.
pub const DEFAULT_QUOTE: &str = "Breathe.";

/// Emoji shown by the widget when the event has none.
pub const DEFAULT_EMOJI: &str = "🕯️";

/// ISO-8601 with millisecond precision and a `Z` suffix, the format the
/// mobile client and widget renderer exchange.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
