//! Home-screen widget bridge.
//!
//! The widget is a separate, display-only renderer. It reads one JSON
//! snapshot of the pinned event from a shared key and re-runs the same
//! countdown and progress functions on its own timeline. The payload field
//! names are a fixed contract with that renderer.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{Capability, CapabilityCell, UnavailableReason};
use crate::countdown::{format_countdown, progress};
use crate::error::WidgetError;
use crate::event::{iso_millis, CountdownEvent, CountdownFormat, CountdownMode, DEFAULT_EMOJI};

pub const WIDGET_KIND: &str = "stillness.countdown";
pub const WIDGET_STORAGE_KEY: &str = "stillness.widget.event";
pub const DEFAULT_TIMELINE_ENTRIES: usize = 60;
pub const DEFAULT_TIMELINE_INTERVAL_SECS: i64 = 60;

/// Snapshot written for the widget renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPayload {
    pub id: String,
    pub title: String,
    pub emoji: String,
    #[serde(with = "iso_millis")]
    pub date_time: DateTime<Utc>,
    pub mode: CountdownMode,
    pub format: CountdownFormat,
    pub mood: String,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    pub progress_enabled: bool,
}

impl From<&CountdownEvent> for WidgetPayload {
    fn from(event: &CountdownEvent) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            emoji: event
                .emoji
                .clone()
                .unwrap_or_else(|| DEFAULT_EMOJI.to_string()),
            date_time: event.target,
            mode: event.mode,
            format: event.format,
            mood: event.mood.as_str().to_string(),
            created_at: event.created_at,
            progress_enabled: event.progress_enabled,
        }
    }
}

impl WidgetPayload {
    /// Rebuild the subset of an event the countdown functions read.
    pub fn to_event(&self) -> CountdownEvent {
        CountdownEvent {
            id: self.id.clone(),
            title: self.title.clone(),
            emoji: Some(self.emoji.clone()),
            target: self.date_time,
            mode: self.mode,
            format: self.format,
            quote: None,
            mood: self.mood.parse().unwrap_or_default(),
            pinned: false,
            background_color: None,
            background_image: None,
            created_at: self.created_at,
            progress_enabled: self.progress_enabled,
            progress_override: None,
            premium_feature_used: false,
            notification_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub text: String,
    pub progress: Option<f64>,
}

/// Precompute the widget's next `entries` frames, `interval` apart.
pub fn build_timeline(
    payload: &WidgetPayload,
    now: DateTime<Utc>,
    entries: usize,
    interval: Duration,
) -> Vec<TimelineEntry> {
    let event = payload.to_event();
    (0..entries)
        .map(|i| {
            let at = now + interval * i as i32;
            TimelineEntry {
                at,
                text: format_countdown(&event, at),
                progress: event.progress_enabled.then(|| progress(&event, at)),
            }
        })
        .collect()
}

/// Key-value surface the widget extension shares with the app.
pub trait WidgetHost: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, WidgetError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), WidgetError>;

    /// Hosts without delete fall back to writing an empty value.
    fn delete_item(&self, key: &str) -> Result<(), WidgetError> {
        self.set_item(key, "")
    }

    /// Ask the renderer to reload its timeline.
    fn update_timelines(&self, kind: &str) -> Result<(), WidgetError>;
}

type Detector<H> = Box<dyn Fn() -> Capability<H> + Send + Sync>;

/// Writes widget payloads through a lazily detected host.
pub struct WidgetSync<H> {
    host: CapabilityCell<H>,
    detector: Option<Detector<H>>,
}

impl<H: WidgetHost> WidgetSync<H> {
    /// Use an already detected host.
    pub fn new(host: Capability<H>) -> Self {
        Self {
            host: CapabilityCell::resolved(host),
            detector: None,
        }
    }

    /// Detect the host on first use.
    pub fn lazy<F>(detector: F) -> Self
    where
        F: Fn() -> Capability<H> + Send + Sync + 'static,
    {
        Self {
            host: CapabilityCell::new(),
            detector: Some(Box::new(detector)),
        }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self::new(Capability::Unavailable(reason))
    }

    pub fn host(&self) -> &Capability<H> {
        self.host.get_or_detect(|| match &self.detector {
            Some(detect) => detect(),
            None => Capability::Unavailable(UnavailableReason::ModuleMissing),
        })
    }

    fn require_host(&self) -> Result<&H, WidgetError> {
        match self.host() {
            Capability::Available(host) => Ok(host),
            Capability::Unavailable(reason) => Err(WidgetError::Unavailable(reason.to_string())),
        }
    }

    /// Payload currently shown, if any.
    pub fn current_payload(&self) -> Result<Option<WidgetPayload>, WidgetError> {
        let Some(host) = self.host().available() else {
            return Ok(None);
        };
        match host.get_item(WIDGET_STORAGE_KEY)? {
            Some(raw) if !raw.is_empty() => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    /// Id of the event shown, `None` when empty, unreadable or unavailable.
    pub fn current_event_id(&self) -> Option<String> {
        match self.current_payload() {
            Ok(payload) => payload.map(|p| p.id),
            Err(err) => {
                warn!(error = %err, "failed to read current widget event");
                None
            }
        }
    }

    /// Show `event` on the widget, or clear it with `None`.
    pub fn sync(&self, event: Option<&CountdownEvent>) -> Result<(), WidgetError> {
        let host = self.require_host()?;
        match event {
            Some(event) => {
                let payload = serde_json::to_string(&WidgetPayload::from(event))?;
                host.set_item(WIDGET_STORAGE_KEY, &payload)?;
            }
            None => host.delete_item(WIDGET_STORAGE_KEY)?,
        }
        host.update_timelines(WIDGET_KIND)?;
        debug!(event_id = event.map(|e| e.id.as_str()), "widget synced");
        Ok(())
    }

    /// Refresh the widget if it is showing `event`. Never fails.
    pub fn auto_sync_if_needed(&self, event: &CountdownEvent) -> bool {
        if self.current_event_id().as_deref() != Some(event.id.as_str()) {
            return false;
        }
        match self.sync(Some(event)) {
            Ok(()) => true,
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "failed to auto-sync widget");
                false
            }
        }
    }

    /// Clear the widget if it is showing `event_id`. Never fails.
    pub fn clear_if_showing(&self, event_id: &str) -> bool {
        if self.current_event_id().as_deref() != Some(event_id) {
            return false;
        }
        match self.sync(None) {
            Ok(()) => true,
            Err(err) => {
                warn!(event_id, error = %err, "failed to clear widget");
                false
            }
        }
    }
}

/// In-process widget host.
#[derive(Debug, Default)]
pub struct MemoryWidgetHost {
    items: Mutex<HashMap<String, String>>,
    reloads: Mutex<Vec<String>>,
}

impl MemoryWidgetHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeline kinds reloaded so far.
    pub fn reloads(&self) -> Vec<String> {
        self.reloads.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl WidgetHost for MemoryWidgetHost {
    fn get_item(&self, key: &str) -> Result<Option<String>, WidgetError> {
        let items = self
            .items
            .lock()
            .map_err(|e| WidgetError::HostFailed(e.to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), WidgetError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| WidgetError::HostFailed(e.to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_item(&self, key: &str) -> Result<(), WidgetError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| WidgetError::HostFailed(e.to_string()))?;
        items.remove(key);
        Ok(())
    }

    fn update_timelines(&self, kind: &str) -> Result<(), WidgetError> {
        self.reloads
            .lock()
            .map_err(|e| WidgetError::HostFailed(e.to_string()))?
            .push(kind.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use chrono::TimeZone;

    fn event() -> CountdownEvent {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let draft = EventDraft {
            title: "Sea".into(),
            target: Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap(),
            progress_enabled: true,
            ..Default::default()
        };
        CountdownEvent::from_draft(draft, created)
    }

    #[test]
    fn payload_uses_exact_field_names() {
        let e = event();
        let json = serde_json::to_value(WidgetPayload::from(&e)).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "createdAt",
                "dateTime",
                "emoji",
                "format",
                "id",
                "mode",
                "mood",
                "progressEnabled",
                "title"
            ]
        );
        assert_eq!(json["emoji"], DEFAULT_EMOJI);
        assert_eq!(json["dateTime"], "2024-01-11T00:00:00.000Z");
        assert_eq!(json["mood"], "Hopeful");
    }

    #[test]
    fn parses_payload_written_by_client() {
        let raw = r#"{"id":"x","title":"Sea","emoji":"🌊","dateTime":"2024-01-11T00:00:00.000Z",
            "mode":"countup","format":"seconds","mood":"Silent",
            "createdAt":"2024-01-01T00:00:00.000Z","progressEnabled":false}"#;
        let payload: WidgetPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.mode, CountdownMode::Countup);
        assert_eq!(payload.to_event().mood, crate::event::Mood::Silent);
    }

    #[test]
    fn timeline_reruns_formatter() {
        let e = event();
        let now = Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap();
        let timeline = build_timeline(&WidgetPayload::from(&e), now, 3, Duration::minutes(1));
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].text, "5 days left");
        assert_eq!(timeline[0].progress, Some(0.5));
        assert_eq!(timeline[2].at, now + Duration::minutes(2));
    }

    #[test]
    fn sync_writes_and_reloads() {
        let widget = WidgetSync::new(Capability::Available(MemoryWidgetHost::new()));
        let e = event();
        widget.sync(Some(&e)).unwrap();
        assert_eq!(widget.current_event_id(), Some(e.id.clone()));

        widget.sync(None).unwrap();
        assert_eq!(widget.current_event_id(), None);
        let host = widget.host().available().unwrap();
        assert_eq!(host.reloads(), vec![WIDGET_KIND.to_string(), WIDGET_KIND.to_string()]);
    }

    #[test]
    fn auto_sync_only_touches_shown_event() {
        let widget = WidgetSync::new(Capability::Available(MemoryWidgetHost::new()));
        let shown = event();
        let other = event();
        widget.sync(Some(&shown)).unwrap();

        assert!(!widget.auto_sync_if_needed(&other));
        let mut renamed = shown.clone();
        renamed.title = "Ocean".into();
        assert!(widget.auto_sync_if_needed(&renamed));
        assert_eq!(widget.current_payload().unwrap().unwrap().title, "Ocean");
        assert!(widget.clear_if_showing(&shown.id));
        assert!(widget.current_payload().unwrap().is_none());
    }

    #[test]
    fn unavailable_host_errors_on_sync_only() {
        let widget: WidgetSync<MemoryWidgetHost> =
            WidgetSync::unavailable(UnavailableReason::PlatformUnsupported);
        assert!(matches!(widget.sync(Some(&event())), Err(WidgetError::Unavailable(_))));
        assert_eq!(widget.current_event_id(), None);
        assert!(!widget.auto_sync_if_needed(&event()));
    }

    #[test]
    fn lazy_host_detected_on_first_use() {
        let widget = WidgetSync::lazy(|| Capability::Available(MemoryWidgetHost::new()));
        assert!(widget.host().is_available());
    }
}
