//! SQLite-backed persistence.
//!
//! Provides persistent storage for:
//! - Key-value documents (event list, widget item)
//! - Notification triggers owned by the local scheduler

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::error::{CoreError, StorageError};
use crate::event::iso_millis;
use crate::notify::{TriggerKind, TriggerSchedule};

/// One trigger stored by the local scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRow {
    pub handle: String,
    pub event_id: String,
    pub kind: TriggerKind,
    pub title: String,
    pub body: String,
    pub schedule: TriggerSchedule,
    #[serde(with = "iso_millis")]
    pub fire_at: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

/// SQLite database shared by the event store, local scheduler and widget host.
///
/// The connection sits behind a mutex so one `Arc<Database>` can serve the
/// async scheduler and the synchronous stores at once.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/stillness/stillness.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("stillness.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves SQLite itself consistent.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key. Returns whether it existed.
    pub fn kv_delete(&self, key: &str) -> Result<bool, StorageError> {
        let n = self.conn().execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    // ── Scheduled notifications ─────────────────────────────────────

    pub fn insert_notification(&self, row: &NotificationRow) -> Result<(), StorageError> {
        let schedule = serde_json::to_string(&row.schedule)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.conn().execute(
            "INSERT INTO scheduled_notifications
                (handle, event_id, kind, title, body, schedule, fire_at, repeats, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.handle,
                row.event_id,
                row.kind.as_str(),
                row.title,
                row.body,
                schedule,
                iso_millis::format(&row.fire_at),
                row.schedule.repeats(),
                iso_millis::format(&row.created_at),
            ],
        )?;
        Ok(())
    }

    /// Delete one trigger. Returns whether it existed.
    pub fn delete_notification(&self, handle: &str) -> Result<bool, StorageError> {
        let n = self.conn().execute(
            "DELETE FROM scheduled_notifications WHERE handle = ?1",
            params![handle],
        )?;
        Ok(n > 0)
    }

    pub fn get_notification(&self, handle: &str) -> Result<Option<NotificationRow>, StorageError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                "SELECT handle, event_id, kind, title, body, schedule, fire_at, created_at
                 FROM scheduled_notifications WHERE handle = ?1",
                params![handle],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    pub fn count_notifications(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM scheduled_notifications",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// List triggers ordered by next fire time, optionally for one event.
    pub fn list_notifications(&self, event_id: Option<&str>) -> Result<Vec<NotificationRow>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT handle, event_id, kind, title, body, schedule, fire_at, created_at
             FROM scheduled_notifications
             WHERE ?1 IS NULL OR event_id = ?1
             ORDER BY fire_at ASC, handle ASC",
        )?;
        let rows = stmt.query_map(params![event_id], RawRow::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    /// Drop one-shot triggers whose fire time has passed. Returns how many.
    pub fn prune_fired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let n = self.conn().execute(
            "DELETE FROM scheduled_notifications WHERE repeats = 0 AND fire_at <= ?1",
            params![iso_millis::format(&now)],
        )?;
        Ok(n)
    }
}

struct RawRow {
    handle: String,
    event_id: String,
    kind: String,
    title: String,
    body: String,
    schedule: String,
    fire_at: String,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            handle: row.get(0)?,
            event_id: row.get(1)?,
            kind: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            schedule: row.get(5)?,
            fire_at: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<NotificationRow, StorageError> {
        let corrupt = |what: &str, detail: String| {
            StorageError::Corrupt(format!("notification {}: bad {what}: {detail}", self.handle))
        };
        let kind = self.kind.parse::<TriggerKind>().map_err(|e| corrupt("kind", e))?;
        let schedule: TriggerSchedule =
            serde_json::from_str(&self.schedule).map_err(|e| corrupt("schedule", e.to_string()))?;
        let fire_at = parse_instant(&self.fire_at).map_err(|e| corrupt("fire_at", e))?;
        let created_at = parse_instant(&self.created_at).map_err(|e| corrupt("created_at", e))?;
        Ok(NotificationRow {
            handle: self.handle,
            event_id: self.event_id,
            kind,
            title: self.title,
            body: self.body,
            schedule,
            fire_at,
            created_at,
        })
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}
