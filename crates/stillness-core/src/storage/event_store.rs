//! Durable event list.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::database::Database;
use crate::error::StorageError;
use crate::event::CountdownEvent;

/// kv key holding the serialized event list.
pub const EVENTS_KEY: &str = "countdown.events";
pub const EVENTS_VERSION: u32 = 1;

/// Whole-list persistence. Saves replace everything previously stored.
pub trait EventStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<CountdownEvent>, StorageError>;

    fn save_all(&self, events: &[CountdownEvent]) -> Result<(), StorageError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    events: &'a [CountdownEvent],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored {
    Envelope { version: u32, events: Vec<CountdownEvent> },
    Legacy(Vec<CountdownEvent>),
}

/// Event list stored as one JSON document in the kv table.
pub struct SqliteEventStore {
    db: Arc<Database>,
}

impl SqliteEventStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl EventStore for SqliteEventStore {
    fn load_all(&self) -> Result<Vec<CountdownEvent>, StorageError> {
        let Some(raw) = self.db.kv_get(EVENTS_KEY)? else {
            return Ok(Vec::new());
        };
        let stored: Stored =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        match stored {
            Stored::Envelope { version, events } => {
                if version > EVENTS_VERSION {
                    return Err(StorageError::Corrupt(format!(
                        "event list version {version} is newer than supported {EVENTS_VERSION}"
                    )));
                }
                Ok(events)
            }
            Stored::Legacy(events) => {
                debug!(count = events.len(), "read legacy event list");
                Ok(events)
            }
        }
    }

    fn save_all(&self, events: &[CountdownEvent]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&EnvelopeRef {
            version: EVENTS_VERSION,
            events,
        })
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.db.kv_set(EVENTS_KEY, &raw)
    }
}

/// In-process store whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<CountdownEvent>>,
    fail_writes: Mutex<bool>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CountdownEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    /// Make every following `save_all` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// What was last saved.
    pub fn snapshot(&self) -> Vec<CountdownEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventStore for MemoryEventStore {
    fn load_all(&self) -> Result<Vec<CountdownEvent>, StorageError> {
        Ok(self.snapshot())
    }

    fn save_all(&self, events: &[CountdownEvent]) -> Result<(), StorageError> {
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(StorageError::WriteFailed("writes disabled".into()));
        }
        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = events.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use chrono::{TimeZone, Utc};

    fn event(title: &str) -> CountdownEvent {
        let draft = EventDraft {
            title: title.into(),
            target: Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap(),
            progress_enabled: true,
            ..Default::default()
        };
        CountdownEvent::from_draft(draft, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn store() -> SqliteEventStore {
        SqliteEventStore::new(Arc::new(Database::open_memory().unwrap()))
    }

    #[test]
    fn empty_store_loads_nothing() {
        assert!(store().load_all().unwrap().is_empty());
    }

    #[test]
    fn save_writes_versioned_envelope() {
        let store = store();
        let events = vec![event("Sea"), event("Hill")];
        store.save_all(&events).unwrap();

        let raw = store.database().kv_get(EVENTS_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["events"][0]["dateTime"], "2024-01-11T00:00:00.000Z");
        assert_eq!(store.load_all().unwrap(), events);
    }

    #[test]
    fn reads_legacy_bare_array() {
        let store = store();
        let raw = r#"[{"id":"a","title":"Old","dateTime":"2020-05-01T10:00:00.000Z",
            "mode":"countup","createdAt":"2020-01-01T00:00:00.000Z"}]"#;
        store.database().kv_set(EVENTS_KEY, raw).unwrap();
        let events = store.load_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Old");
        assert!(events[0].progress_enabled);
        assert!(events[0].notification_ids.is_empty());
    }

    #[test]
    fn corrupt_document_is_reported() {
        let store = store();
        store.database().kv_set(EVENTS_KEY, "{not json").unwrap();
        assert!(matches!(store.load_all(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn memory_store_write_failure_keeps_previous_state() {
        let store = MemoryEventStore::with_events(vec![event("Sea")]);
        store.set_fail_writes(true);
        assert!(store.save_all(&[]).is_err());
        assert_eq!(store.snapshot().len(), 1);
        store.set_fail_writes(false);
        store.save_all(&[]).unwrap();
        assert!(store.snapshot().is_empty());
    }
}
