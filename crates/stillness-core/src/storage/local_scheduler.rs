//! Notification scheduler persisted in SQLite.
//!
//! Stands in for the OS notification service on desktop and in the CLI:
//! triggers are recorded with their next fire time and nothing is delivered.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::database::{Database, NotificationRow};
use crate::error::NotifyError;
use crate::notify::{NotificationScheduler, PlannedTrigger, DEFAULT_CAPACITY_LIMIT};

pub struct LocalScheduler {
    db: Arc<Database>,
    limit: usize,
    permission: bool,
}

impl LocalScheduler {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            limit: DEFAULT_CAPACITY_LIMIT,
            permission: true,
        }
    }

    /// Refuse new triggers once `limit` are stored.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = granted;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Stored triggers, soonest first.
    pub fn pending(&self, event_id: Option<&str>) -> Result<Vec<NotificationRow>, NotifyError> {
        self.prune();
        self.db
            .list_notifications(event_id)
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }

    fn prune(&self) {
        match self.db.prune_fired(Utc::now()) {
            Ok(0) => {}
            Ok(n) => debug!(pruned = n, "dropped fired one-shot triggers"),
            Err(err) => warn!(error = %err, "failed to prune fired triggers"),
        }
    }
}

#[async_trait]
impl NotificationScheduler for LocalScheduler {
    async fn request_permission(&self) -> bool {
        self.permission
    }

    async fn schedule(&self, trigger: &PlannedTrigger) -> Result<String, NotifyError> {
        if !self.permission {
            return Err(NotifyError::PermissionDenied);
        }
        self.prune();
        let count = self
            .db
            .count_notifications()
            .map_err(|e| NotifyError::Backend(e.to_string()))?;
        if count >= self.limit {
            return Err(NotifyError::CapacityExceeded { limit: self.limit });
        }

        let row = NotificationRow {
            handle: format!("local-{}", uuid::Uuid::new_v4()),
            event_id: trigger.event_id.clone(),
            kind: trigger.kind,
            title: trigger.title.clone(),
            body: trigger.body.clone(),
            schedule: trigger.schedule.clone(),
            fire_at: trigger.fire_at(),
            created_at: Utc::now(),
        };
        self.db
            .insert_notification(&row)
            .map_err(|e| NotifyError::Backend(e.to_string()))?;
        Ok(row.handle)
    }

    async fn cancel(&self, handle: &str) -> Result<(), NotifyError> {
        let existed = self
            .db
            .delete_notification(handle)
            .map_err(|e| NotifyError::Backend(e.to_string()))?;
        if !existed {
            debug!(handle, "cancel of unknown or fired trigger");
        }
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<usize, NotifyError> {
        self.prune();
        self.db
            .count_notifications()
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }
}
