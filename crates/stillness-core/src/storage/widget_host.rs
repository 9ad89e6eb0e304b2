//! Widget host backed by the kv table.
//!
//! Used where no platform widget extension exists: the payload lands in the
//! same database the CLI reads, and timeline reloads are only counted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::database::Database;
use crate::error::WidgetError;
use crate::widget::WidgetHost;

pub struct KvWidgetHost {
    db: Arc<Database>,
    reloads: AtomicUsize,
}

impl KvWidgetHost {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            reloads: AtomicUsize::new(0),
        }
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::Relaxed)
    }
}

impl WidgetHost for KvWidgetHost {
    fn get_item(&self, key: &str) -> Result<Option<String>, WidgetError> {
        self.db
            .kv_get(key)
            .map_err(|e| WidgetError::HostFailed(e.to_string()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), WidgetError> {
        self.db
            .kv_set(key, value)
            .map_err(|e| WidgetError::HostFailed(e.to_string()))
    }

    fn delete_item(&self, key: &str) -> Result<(), WidgetError> {
        self.db
            .kv_delete(key)
            .map(|_| ())
            .map_err(|e| WidgetError::HostFailed(e.to_string()))
    }

    fn update_timelines(&self, kind: &str) -> Result<(), WidgetError> {
        let n = self.reloads.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(kind, reloads = n, "widget timeline reload requested");
        Ok(())
    }
}
