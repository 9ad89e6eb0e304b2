//! Event list ownership and the operations the UI calls.
//!
//! [`EventBook`] keeps the in-memory list and never lets it drift from the
//! store: every mutation builds the next list, saves it, and only then
//! swaps it in. [`CountdownService`] layers trigger scheduling, widget sync
//! and the premium gate on top.

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result, StorageError};
use crate::event::{CountdownEvent, EventDraft, EventPatch};
use crate::notify::{
    EventLifecycleCoordinator, NotificationPreferences, NotificationScheduler, ScheduleOutcome,
};
use crate::premium::PremiumGate;
use crate::storage::EventStore;
use crate::widget::{WidgetHost, WidgetSync};

/// Pinned first, then soonest target.
pub fn sort_events(events: &mut [CountdownEvent]) {
    events.sort_by(|a, b| b.pinned.cmp(&a.pinned).then(a.target.cmp(&b.target)));
}

pub struct EventBook<S> {
    store: S,
    events: Vec<CountdownEvent>,
}

impl<S: EventStore> EventBook<S> {
    /// Load every stored event.
    ///
    /// # Errors
    /// Returns the store's error when the list cannot be read.
    pub fn load(store: S) -> Result<Self, StorageError> {
        let events = store.load_all()?;
        Ok(Self { store, events })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Events in display order.
    pub fn list(&self) -> Vec<CountdownEvent> {
        let mut events = self.events.clone();
        sort_events(&mut events);
        events
    }

    pub fn get(&self, id: &str) -> Option<&CountdownEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn insert(&mut self, event: CountdownEvent) -> Result<(), StorageError> {
        let mut next = self.events.clone();
        next.retain(|e| e.id != event.id);
        next.push(event);
        self.commit(next)
    }

    pub fn replace(&mut self, event: CountdownEvent) -> Result<()> {
        let mut next = self.events.clone();
        let slot = next
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| CoreError::EventNotFound(event.id.clone()))?;
        *slot = event;
        Ok(self.commit(next)?)
    }

    pub fn remove(&mut self, id: &str) -> Result<CountdownEvent> {
        let mut next = self.events.clone();
        let index = next
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CoreError::EventNotFound(id.to_string()))?;
        let removed = next.remove(index);
        self.commit(next)?;
        Ok(removed)
    }

    /// Flip the pinned flag. Returns the new value.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        let mut next = self.events.clone();
        let event = next
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::EventNotFound(id.to_string()))?;
        event.pinned = !event.pinned;
        let pinned = event.pinned;
        self.commit(next)?;
        Ok(pinned)
    }

    pub fn replace_all(&mut self, events: Vec<CountdownEvent>) -> Result<(), StorageError> {
        self.commit(events)
    }

    /// Point a record at its live trigger handles after a failed write.
    ///
    /// Memory always takes the handles; the store write is best effort.
    /// Returns false for an unknown id.
    pub fn restore_handles(&mut self, id: &str, handles: Vec<String>) -> bool {
        let Some(event) = self.events.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        event.set_notification_ids(handles);
        if let Err(err) = self.store.save_all(&self.events) {
            warn!(event_id = id, error = %err, "could not persist restored trigger handles");
        }
        true
    }

    fn commit(&mut self, next: Vec<CountdownEvent>) -> Result<(), StorageError> {
        self.store.save_all(&next)?;
        self.events = next;
        Ok(())
    }
}

pub struct CountdownService<S, N, H> {
    book: EventBook<S>,
    coordinator: EventLifecycleCoordinator<N>,
    widget: WidgetSync<H>,
    premium: PremiumGate,
}

impl<S, N, H> CountdownService<S, N, H>
where
    S: EventStore,
    N: NotificationScheduler,
    H: WidgetHost,
{
    pub fn new(
        book: EventBook<S>,
        coordinator: EventLifecycleCoordinator<N>,
        widget: WidgetSync<H>,
        premium: PremiumGate,
    ) -> Self {
        Self {
            book,
            coordinator,
            widget,
            premium,
        }
    }

    pub fn book(&self) -> &EventBook<S> {
        &self.book
    }

    pub fn coordinator(&self) -> &EventLifecycleCoordinator<N> {
        &self.coordinator
    }

    pub fn widget(&self) -> &WidgetSync<H> {
        &self.widget
    }

    pub fn premium(&self) -> PremiumGate {
        self.premium
    }

    pub fn set_premium(&mut self, premium: PremiumGate) {
        self.premium = premium;
    }

    pub fn list(&self) -> Vec<CountdownEvent> {
        self.book.list()
    }

    pub fn get(&self, id: &str) -> Result<&CountdownEvent> {
        self.book
            .get(id)
            .ok_or_else(|| CoreError::EventNotFound(id.to_string()))
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Validate, schedule and store a new event.
    ///
    /// # Errors
    /// Validation and storage failures. Scheduling problems are reported in
    /// the outcome instead.
    pub async fn create_event<Tz: TimeZone>(
        &mut self,
        draft: EventDraft,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> Result<(CountdownEvent, ScheduleOutcome)> {
        let premium_used = self.premium.check(&draft)?;
        let mut event = CountdownEvent::from_draft(draft, now.with_timezone(&Utc));
        event.premium_feature_used = premium_used;

        let outcome = self.coordinator.on_create(&mut event, preferences, now).await;
        if let Err(err) = self.book.insert(event.clone()) {
            self.coordinator.on_delete(&event.id, &event.notification_ids).await;
            return Err(err.into());
        }
        info!(event_id = %event.id, triggers = outcome.handles.len(), "event created");
        self.widget.auto_sync_if_needed(&event);
        Ok((event, outcome))
    }

    /// Apply `patch`, then cancel and recreate the event's triggers.
    ///
    /// # Errors
    /// Unknown id, validation and storage failures.
    pub async fn update_event<Tz: TimeZone>(
        &mut self,
        id: &str,
        patch: EventPatch,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> Result<(CountdownEvent, ScheduleOutcome)> {
        let previous = self.get(id)?.clone();
        let mut event = previous.clone();
        if !event.apply(patch) {
            debug!(event_id = %event.id, "edit touched no reminder fields");
        }
        event.premium_feature_used = self.premium.check(&draft_of(&event))?;

        let outcome = self
            .coordinator
            .on_update(&mut event, preferences, now.clone())
            .await;
        if let Err(err) = self.book.replace(event.clone()) {
            // Drop the edited triggers and give the unchanged record its
            // reminders back.
            self.coordinator.on_delete(&event.id, &event.notification_ids).await;
            let mut restored = previous;
            self.coordinator.on_update(&mut restored, preferences, now).await;
            self.book.restore_handles(&restored.id, restored.notification_ids);
            return Err(err);
        }
        info!(event_id = %event.id, triggers = outcome.handles.len(), "event updated");
        self.widget.auto_sync_if_needed(&event);
        Ok((event, outcome))
    }

    /// Cancel every trigger, then drop the event. Returns the number of
    /// cancel calls issued.
    pub async fn delete_event(&mut self, id: &str) -> Result<usize> {
        let handles = self.get(id)?.notification_ids.clone();
        let cancelled = self.coordinator.on_delete(id, &handles).await;
        self.book.remove(id)?;
        self.widget.clear_if_showing(id);
        Ok(cancelled)
    }

    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        self.book.toggle_pin(id)
    }

    /// Re-plan every event, e.g. after reminder preferences changed.
    ///
    /// # Errors
    /// Storage failure. Triggers scheduled by this pass are cancelled again
    /// before the error is returned, so a retry starts from a clean slate.
    pub async fn reschedule_all<Tz: TimeZone>(
        &mut self,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> Result<Vec<(String, ScheduleOutcome)>> {
        let mut events = self.book.list();
        let mut outcomes = Vec::with_capacity(events.len());
        for event in &mut events {
            let outcome = self
                .coordinator
                .on_update(event, preferences, now.clone())
                .await;
            outcomes.push((event.id.clone(), outcome));
        }
        if let Err(err) = self.book.replace_all(events.clone()) {
            for event in &events {
                self.coordinator.on_delete(&event.id, &event.notification_ids).await;
            }
            return Err(err.into());
        }
        info!(events = outcomes.len(), "rescheduled all events");
        Ok(outcomes)
    }

    // ── Widget ──────────────────────────────────────────────────────

    /// Show `id` on the widget.
    ///
    /// # Errors
    /// Unknown id, or the widget host is unavailable or failed.
    pub fn pin_to_widget(&self, id: &str) -> Result<()> {
        let event = self.get(id)?;
        self.widget.sync(Some(event))?;
        Ok(())
    }

    pub fn clear_widget(&self) -> Result<()> {
        self.widget.sync(None)?;
        Ok(())
    }

    /// The event the widget currently shows, if it still exists.
    pub fn widget_event(&self) -> Option<&CountdownEvent> {
        let id = self.widget.current_event_id()?;
        let event = self.book.get(&id);
        if event.is_none() {
            warn!(event_id = %id, "widget shows an event that no longer exists");
        }
        event
    }
}

/// The gate-relevant fields of an existing event.
fn draft_of(event: &CountdownEvent) -> EventDraft {
    EventDraft {
        title: event.title.clone(),
        target: event.target,
        mood: event.mood,
        background_image: event.background_image.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::error::ValidationError;
    use crate::event::Mood;
    use crate::notify::{MemoryScheduler, NotificationPlanner};
    use crate::storage::MemoryEventStore;
    use crate::widget::MemoryWidgetHost;
    use chrono::Duration;

    type TestService = CountdownService<MemoryEventStore, MemoryScheduler, MemoryWidgetHost>;

    fn service() -> TestService {
        CountdownService::new(
            EventBook::load(MemoryEventStore::new()).unwrap(),
            EventLifecycleCoordinator::new(MemoryScheduler::new(), NotificationPlanner::default()),
            WidgetSync::new(Capability::Available(MemoryWidgetHost::new())),
            PremiumGate::new(false),
        )
    }

    fn draft(title: &str, target: DateTime<Utc>) -> EventDraft {
        EventDraft {
            title: title.into(),
            target,
            progress_enabled: true,
            ..Default::default()
        }
    }

    fn prefs() -> NotificationPreferences {
        NotificationPreferences::all()
    }

    #[tokio::test]
    async fn create_persists_with_handles() {
        let now = Utc::now();
        let mut svc = service();
        let (event, outcome) = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await
            .unwrap();
        assert_eq!(outcome.handles.len(), 2);
        let stored = svc.book().store().snapshot();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].notification_ids, event.notification_ids);
    }

    #[tokio::test]
    async fn list_is_pinned_first_then_by_target() {
        let now = Utc::now();
        let mut svc = service();
        let (late, _) = svc
            .create_event(draft("Late", now + Duration::days(9)), &prefs(), now)
            .await
            .unwrap();
        svc.create_event(draft("Soon", now + Duration::days(1)), &prefs(), now)
            .await
            .unwrap();
        svc.create_event(draft("Past", now - Duration::days(1)), &prefs(), now)
            .await
            .unwrap();
        svc.toggle_pin(&late.id).unwrap();

        let titles: Vec<String> = svc.list().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Late", "Past", "Soon"]);
    }

    #[tokio::test]
    async fn premium_mood_is_gated() {
        let now = Utc::now();
        let mut svc = service();
        let mut d = draft("Quiet", now + Duration::days(2));
        d.mood = Mood::Silent;
        let err = svc.create_event(d.clone(), &prefs(), now).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::PremiumRequired { .. })
        ));
        assert!(svc.book().is_empty());
        assert!(svc.coordinator().scheduler().calls().is_empty());

        svc.set_premium(PremiumGate::new(true));
        let (event, _) = svc.create_event(d, &prefs(), now).await.unwrap();
        assert!(event.premium_feature_used);
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_and_triggers_clean() {
        let now = Utc::now();
        let mut svc = service();
        svc.book().store().set_fail_writes(true);
        let result = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await;
        assert!(matches!(result, Err(CoreError::Storage(_))));
        assert!(svc.list().is_empty());
        assert_eq!(svc.coordinator().scheduler().scheduled_count(), 0);
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_record() {
        let now = Utc::now();
        let mut svc = service();
        let (event, _) = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await
            .unwrap();
        svc.book().store().set_fail_writes(true);
        let patch = EventPatch {
            title: Some("Ocean".into()),
            ..Default::default()
        };
        assert!(svc.update_event(&event.id, patch, &prefs(), now).await.is_err());

        let kept = svc.get(&event.id).unwrap();
        assert_eq!(kept.title, "Sea");
        assert_eq!(kept.notification_ids.len(), 2);
        let scheduler = svc.coordinator().scheduler();
        assert_eq!(scheduler.active_for(&event.id), kept.notification_ids.len());
        let live: Vec<String> = scheduler.scheduled().into_iter().map(|t| t.title).collect();
        assert!(live.iter().all(|title| title.contains("Sea")), "{live:?}");
    }

    #[tokio::test]
    async fn failed_reschedule_leaves_no_orphans() {
        let now = Utc::now();
        let mut svc = service();
        let (event, _) = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await
            .unwrap();

        svc.book().store().set_fail_writes(true);
        assert!(matches!(
            svc.reschedule_all(&prefs(), now).await,
            Err(CoreError::Storage(_))
        ));
        assert_eq!(svc.coordinator().scheduler().active_for(&event.id), 0);

        svc.book().store().set_fail_writes(false);
        svc.reschedule_all(&prefs(), now).await.unwrap();
        let recorded = svc.get(&event.id).unwrap().notification_ids.len();
        assert_eq!(recorded, 2);
        assert_eq!(svc.coordinator().scheduler().active_for(&event.id), recorded);
    }

    #[tokio::test]
    async fn cosmetic_edit_still_replaces_triggers() {
        let now = Utc::now();
        let mut svc = service();
        let (event, _) = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await
            .unwrap();
        let patch = EventPatch {
            mood: Some(Mood::Melancholy),
            ..Default::default()
        };
        let (updated, outcome) = svc.update_event(&event.id, patch, &prefs(), now).await.unwrap();
        assert_eq!(outcome.cancelled, 2);
        assert_eq!(updated.notification_ids, outcome.handles);
        assert_eq!(svc.coordinator().scheduler().active_for(&event.id), 2);
    }

    #[tokio::test]
    async fn update_refreshes_shown_widget() {
        let now = Utc::now();
        let mut svc = service();
        let (event, _) = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await
            .unwrap();
        svc.pin_to_widget(&event.id).unwrap();

        let patch = EventPatch {
            title: Some("Ocean".into()),
            ..Default::default()
        };
        svc.update_event(&event.id, patch, &prefs(), now).await.unwrap();
        let payload = svc.widget().current_payload().unwrap().unwrap();
        assert_eq!(payload.title, "Ocean");
        assert_eq!(svc.widget_event().map(|e| e.id.as_str()), Some(event.id.as_str()));
    }

    #[tokio::test]
    async fn delete_cancels_and_clears_widget() {
        let now = Utc::now();
        let mut svc = service();
        let (event, _) = svc
            .create_event(draft("Sea", now + Duration::days(5)), &prefs(), now)
            .await
            .unwrap();
        svc.pin_to_widget(&event.id).unwrap();

        let cancelled = svc.delete_event(&event.id).await.unwrap();
        assert_eq!(cancelled, 2);
        assert_eq!(svc.coordinator().scheduler().active_for(&event.id), 0);
        assert!(svc.widget().current_event_id().is_none());
        assert!(matches!(
            svc.delete_event(&event.id).await,
            Err(CoreError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn reschedule_all_follows_new_preferences() {
        let now = Utc::now();
        let mut svc = service();
        for days in [3, 6] {
            svc.create_event(draft("Trip", now + Duration::days(days)), &prefs(), now)
                .await
                .unwrap();
        }
        assert_eq!(svc.coordinator().scheduler().scheduled_count(), 4);

        let final_only = NotificationPreferences {
            daily: false,
            ..NotificationPreferences::all()
        };
        let outcomes = svc.reschedule_all(&final_only, now).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(svc.coordinator().scheduler().scheduled_count(), 2);
        assert!(svc.list().iter().all(|e| e.notification_ids.len() == 1));
    }
}
