//! Notification planning.
//!
//! Turns an event plus the user's reminder preferences into the set of
//! triggers that should exist for it right now. Planning is pure: the same
//! `(event, preferences, now)` always yields the same plan, which is what
//! lets the coordinator cancel and recreate triggers without drift.
//!
//! Three independent kinds are planned:
//!
//! | kind          | eligible when          | schedule                     |
//! |---------------|------------------------|------------------------------|
//! | `final`       | target in the future   | once, at the target instant  |
//! | `daily`       | target in the future   | every day at reminder time   |
//! | `anniversary` | target in the past     | every year on target's date  |
//!
//! Ineligible kinds are skipped silently and reported in
//! [`NotificationPlan::skipped`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::notification_line;
use crate::event::CountdownEvent;

/// Observed per-platform cap on concurrently scheduled triggers.
pub const DEFAULT_CAPACITY_LIMIT: usize = 64;
/// Upper bound of triggers one event can own.
pub const MAX_TRIGGERS_PER_EVENT: usize = 3;
pub const DEFAULT_REMINDER_HOUR: u32 = 9;
pub const DEFAULT_REMINDER_MINUTE: u32 = 0;

const FINAL_DAY_PREFIX: &str = "It is today.";
const DAILY_TAGLINE: &str = "Time moves quietly.";

/// Which reminders the user wants. Supplied by settings, read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub daily: bool,
    pub final_day: bool,
    pub anniversary: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            daily: false,
            final_day: true,
            anniversary: true,
        }
    }
}

impl NotificationPreferences {
    pub fn none() -> Self {
        Self {
            daily: false,
            final_day: false,
            anniversary: false,
        }
    }

    pub fn all() -> Self {
        Self {
            daily: true,
            final_day: true,
            anniversary: true,
        }
    }

    fn enabled(&self, kind: TriggerKind) -> bool {
        match kind {
            TriggerKind::FinalDay => self.final_day,
            TriggerKind::Daily => self.daily,
            TriggerKind::Anniversary => self.anniversary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    #[serde(rename = "final")]
    FinalDay,
    Daily,
    Anniversary,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [TriggerKind::FinalDay, TriggerKind::Daily, TriggerKind::Anniversary];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::FinalDay => "final",
            TriggerKind::Daily => "daily",
            TriggerKind::Anniversary => "anniversary",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown trigger kind: {s}"))
    }
}

/// When a trigger fires. `first_fire` is always a concrete instant so
/// callers can sort, display and test recurring triggers too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TriggerSchedule {
    Once {
        at: DateTime<Utc>,
    },
    Daily {
        hour: u32,
        minute: u32,
        first_fire: DateTime<Utc>,
    },
    Yearly {
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        first_fire: DateTime<Utc>,
    },
}

impl TriggerSchedule {
    pub fn first_fire(&self) -> DateTime<Utc> {
        match self {
            TriggerSchedule::Once { at } => *at,
            TriggerSchedule::Daily { first_fire, .. } => *first_fire,
            TriggerSchedule::Yearly { first_fire, .. } => *first_fire,
        }
    }

    pub fn repeats(&self) -> bool {
        !matches!(self, TriggerSchedule::Once { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTrigger {
    pub event_id: String,
    pub kind: TriggerKind,
    pub title: String,
    pub body: String,
    pub schedule: TriggerSchedule,
    /// `"{event_id}-{kind}"`, stable across re-planning.
    pub dedupe_key: String,
}

impl PlannedTrigger {
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.schedule.first_fire()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Preference switched off.
    Disabled,
    /// Kind only applies to future events.
    EventInPast,
    /// Kind only applies to past events.
    EventInFuture,
    /// No valid local instant could be built (calendar edge).
    NoValidTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTrigger {
    pub kind: TriggerKind,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPlan {
    pub event_id: String,
    pub triggers: Vec<PlannedTrigger>,
    pub skipped: Vec<SkippedTrigger>,
}

impl NotificationPlan {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn get(&self, kind: TriggerKind) -> Option<&PlannedTrigger> {
        self.triggers.iter().find(|t| t.kind == kind)
    }
}

/// How close the scheduler is to its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    #[default]
    Ok,
    /// Everything fits, but the next event may not.
    Approaching,
    /// Not every planned trigger fits.
    Exceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub limit: usize,
    pub max_per_event: usize,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CAPACITY_LIMIT,
            max_per_event: MAX_TRIGGERS_PER_EVENT,
        }
    }
}

impl CapacityPolicy {
    /// Assess adding `incoming` triggers to `scheduled` existing ones.
    pub fn assess(&self, scheduled: usize, incoming: usize) -> CapacityStatus {
        let total = scheduled.saturating_add(incoming);
        if total > self.limit {
            CapacityStatus::Exceeded
        } else if total.saturating_add(self.max_per_event) > self.limit {
            CapacityStatus::Approaching
        } else {
            CapacityStatus::Ok
        }
    }
}

/// Assess against `limit` with the default per-event headroom.
pub fn assess_capacity(scheduled: usize, incoming: usize, limit: usize) -> CapacityStatus {
    CapacityPolicy {
        limit,
        max_per_event: MAX_TRIGGERS_PER_EVENT,
    }
    .assess(scheduled, incoming)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSettings {
    pub reminder_hour: u32,
    pub reminder_minute: u32,
    pub capacity: CapacityPolicy,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            reminder_hour: DEFAULT_REMINDER_HOUR,
            reminder_minute: DEFAULT_REMINDER_MINUTE,
            capacity: CapacityPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationPlanner {
    settings: PlannerSettings,
}

impl NotificationPlanner {
    pub fn new(settings: PlannerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn capacity(&self) -> CapacityPolicy {
        self.settings.capacity
    }

    /// Plan triggers for `event` at `now`.
    ///
    /// `now` carries the user's time zone; reminder times and anniversary
    /// dates are resolved in it.
    pub fn plan<Tz: TimeZone>(
        &self,
        event: &CountdownEvent,
        preferences: &NotificationPreferences,
        now: DateTime<Tz>,
    ) -> NotificationPlan {
        let tz = now.timezone();
        let now_utc = now.with_timezone(&Utc);
        let mut plan = NotificationPlan {
            event_id: event.id.clone(),
            ..Default::default()
        };

        for kind in TriggerKind::ALL {
            if !preferences.enabled(kind) {
                plan.skipped.push(SkippedTrigger {
                    kind,
                    reason: SkipReason::Disabled,
                });
                continue;
            }
            match self.plan_kind(kind, event, &tz, now_utc) {
                Ok(trigger) => plan.triggers.push(trigger),
                Err(reason) => plan.skipped.push(SkippedTrigger { kind, reason }),
            }
        }

        plan
    }

    fn plan_kind<Tz: TimeZone>(
        &self,
        kind: TriggerKind,
        event: &CountdownEvent,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Result<PlannedTrigger, SkipReason> {
        let (schedule, body) = match kind {
            TriggerKind::FinalDay => {
                if event.target <= now {
                    return Err(SkipReason::EventInPast);
                }
                let body = format!("{FINAL_DAY_PREFIX} {}", event.quote_or_default());
                (TriggerSchedule::Once { at: event.target }, body)
            }
            TriggerKind::Daily => {
                if event.target <= now {
                    return Err(SkipReason::EventInPast);
                }
                let first_fire = self
                    .next_daily_fire(tz, now)
                    .ok_or(SkipReason::NoValidTime)?;
                let body = format!("{}. {DAILY_TAGLINE}", notification_line(event, now));
                let schedule = TriggerSchedule::Daily {
                    hour: self.settings.reminder_hour,
                    minute: self.settings.reminder_minute,
                    first_fire,
                };
                (schedule, body)
            }
            TriggerKind::Anniversary => {
                if event.target >= now {
                    return Err(SkipReason::EventInFuture);
                }
                let anchor = event.target.with_timezone(tz);
                let (month, day) = (anchor.month(), anchor.day());
                let (first_fire, years) = self
                    .next_anniversary(tz, anchor.year(), month, day, now)
                    .ok_or(SkipReason::NoValidTime)?;
                let schedule = TriggerSchedule::Yearly {
                    month,
                    day,
                    hour: self.settings.reminder_hour,
                    minute: self.settings.reminder_minute,
                    first_fire,
                };
                (schedule, anniversary_body(years))
            }
        };

        Ok(PlannedTrigger {
            event_id: event.id.clone(),
            kind,
            title: event.title.clone(),
            body,
            schedule,
            dedupe_key: format!("{}-{}", event.id, kind.as_str()),
        })
    }

    /// Today's reminder time if still ahead, otherwise tomorrow's.
    fn next_daily_fire<Tz: TimeZone>(&self, tz: &Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(tz).date_naive();
        let fire = self.local_reminder(tz, today)?;
        if fire > now {
            return Some(fire);
        }
        self.local_reminder(tz, today.succ_opt()?)
    }

    /// First anniversary strictly after `now`, at least one year after the
    /// target's own year. Returns the instant and the year count.
    fn next_anniversary<Tz: TimeZone>(
        &self,
        tz: &Tz,
        target_year: i32,
        month: u32,
        day: u32,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, i32)> {
        let this_year = now.with_timezone(tz).year();
        let mut year = this_year.max(target_year + 1);
        // At most one roll-over: this year's date has passed, next year's cannot have.
        for _ in 0..2 {
            let date = anniversary_date(year, month, day)?;
            let fire = self.local_reminder(tz, date)?;
            if fire > now {
                return Some((fire, year - target_year));
            }
            year += 1;
        }
        None
    }

    fn local_reminder<Tz: TimeZone>(&self, tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
        let naive = date.and_hms_opt(self.settings.reminder_hour, self.settings.reminder_minute, 0)?;
        tz.from_local_datetime(&naive)
            .earliest()
            // Reminder time inside a DST gap: use the first valid hour after it.
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Month/day in `year`; Feb 29 falls back to Feb 28 outside leap years.
fn anniversary_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| {
        if month == 2 && day == 29 {
            NaiveDate::from_ymd_opt(year, 2, 28)
        } else {
            None
        }
    })
}

fn anniversary_body(years: i32) -> String {
    if years <= 1 {
        "It's been 1 year today.".to_string()
    } else {
        format!("It's been {years} years today.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CountdownMode, EventDraft};
    use chrono::{FixedOffset, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn event(target: DateTime<Utc>, created: DateTime<Utc>) -> CountdownEvent {
        let draft = EventDraft {
            title: "Harbour".into(),
            target,
            mode: CountdownMode::Countdown,
            progress_enabled: true,
            ..Default::default()
        };
        CountdownEvent::from_draft(draft, created)
    }

    #[test]
    fn future_event_gets_final_and_daily() {
        let e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::all(), utc(2024, 1, 6, 0));

        let final_day = plan.get(TriggerKind::FinalDay).unwrap();
        assert_eq!(final_day.fire_at(), utc(2024, 1, 11, 0));
        assert_eq!(final_day.body, "It is today. Breathe.");
        assert_eq!(final_day.title, "Harbour");
        assert_eq!(final_day.dedupe_key, format!("{}-final", e.id));

        let daily = plan.get(TriggerKind::Daily).unwrap();
        assert_eq!(daily.fire_at(), utc(2024, 1, 6, 9));
        assert_eq!(daily.body, "5 days left. Time moves quietly.");
        assert!(daily.schedule.repeats());

        assert!(plan.get(TriggerKind::Anniversary).is_none());
        assert_eq!(
            plan.skipped,
            vec![SkippedTrigger {
                kind: TriggerKind::Anniversary,
                reason: SkipReason::EventInFuture
            }]
        );
    }

    #[test]
    fn final_day_uses_event_quote() {
        let mut e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        e.quote = Some("Let it be.".into());
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::default(), utc(2024, 1, 6, 0));
        assert_eq!(plan.get(TriggerKind::FinalDay).unwrap().body, "It is today. Let it be.");
    }

    #[test]
    fn daily_after_reminder_time_moves_to_tomorrow() {
        let e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        let prefs = NotificationPreferences { daily: true, ..NotificationPreferences::none() };
        let plan = NotificationPlanner::default().plan(&e, &prefs, utc(2024, 1, 6, 9));
        assert_eq!(plan.get(TriggerKind::Daily).unwrap().fire_at(), utc(2024, 1, 7, 9));
    }

    #[test]
    fn reminder_time_is_local() {
        let e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        let prefs = NotificationPreferences { daily: true, ..NotificationPreferences::none() };
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = utc(2024, 1, 6, 1).with_timezone(&tokyo); // 10:00 local
        let plan = NotificationPlanner::default().plan(&e, &prefs, now);
        let fire = plan.get(TriggerKind::Daily).unwrap().fire_at();
        // Tomorrow 09:00 in Tokyo is 00:00 UTC.
        assert_eq!(fire, utc(2024, 1, 7, 0));
        assert_eq!(fire.with_timezone(&tokyo).hour(), 9);
    }

    #[test]
    fn past_event_skips_future_only_kinds() {
        let e = event(utc(2023, 3, 5, 12), utc(2023, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::all(), utc(2024, 3, 10, 0));
        assert_eq!(plan.len(), 1);
        assert!(plan.skipped.contains(&SkippedTrigger {
            kind: TriggerKind::FinalDay,
            reason: SkipReason::EventInPast
        }));
        assert!(plan.skipped.contains(&SkippedTrigger {
            kind: TriggerKind::Daily,
            reason: SkipReason::EventInPast
        }));
    }

    #[test]
    fn passed_anniversary_rolls_to_next_year() {
        let e = event(utc(2023, 3, 5, 12), utc(2023, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::all(), utc(2024, 3, 10, 0));
        let anniversary = plan.get(TriggerKind::Anniversary).unwrap();
        assert_eq!(anniversary.fire_at(), utc(2025, 3, 5, 9));
        assert_eq!(anniversary.body, "It's been 2 years today.");
        assert!(matches!(
            anniversary.schedule,
            TriggerSchedule::Yearly { month: 3, day: 5, hour: 9, minute: 0, .. }
        ));
    }

    #[test]
    fn upcoming_anniversary_stays_this_year() {
        let e = event(utc(2022, 6, 1, 12), utc(2022, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::all(), utc(2024, 3, 10, 0));
        let anniversary = plan.get(TriggerKind::Anniversary).unwrap();
        assert_eq!(anniversary.fire_at(), utc(2024, 6, 1, 9));
        assert_eq!(anniversary.body, "It's been 2 years today.");
    }

    #[test]
    fn same_year_event_waits_a_full_year() {
        let e = event(utc(2024, 3, 10, 6), utc(2024, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::all(), utc(2024, 3, 10, 7));
        let anniversary = plan.get(TriggerKind::Anniversary).unwrap();
        assert_eq!(anniversary.fire_at(), utc(2025, 3, 10, 9));
        assert_eq!(anniversary.body, "It's been 1 year today.");
    }

    #[test]
    fn leap_day_anniversary_falls_back() {
        let e = event(utc(2024, 2, 29, 12), utc(2024, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::all(), utc(2024, 6, 1, 0));
        assert_eq!(plan.get(TriggerKind::Anniversary).unwrap().fire_at(), utc(2025, 2, 28, 9));
    }

    #[test]
    fn disabled_preferences_plan_nothing() {
        let e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        let plan = NotificationPlanner::default().plan(&e, &NotificationPreferences::none(), utc(2024, 1, 6, 0));
        assert!(plan.is_empty());
        assert!(plan.skipped.iter().all(|s| s.reason == SkipReason::Disabled));
    }

    #[test]
    fn planning_is_deterministic() {
        let e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        let planner = NotificationPlanner::default();
        let now = utc(2024, 1, 6, 3);
        assert_eq!(
            planner.plan(&e, &NotificationPreferences::all(), now),
            planner.plan(&e, &NotificationPreferences::all(), now)
        );
    }

    #[test]
    fn custom_reminder_time() {
        let e = event(utc(2024, 1, 11, 0), utc(2024, 1, 1, 0));
        let planner = NotificationPlanner::new(PlannerSettings {
            reminder_hour: 20,
            reminder_minute: 30,
            ..Default::default()
        });
        let prefs = NotificationPreferences { daily: true, ..NotificationPreferences::none() };
        let plan = planner.plan(&e, &prefs, utc(2024, 1, 6, 12));
        assert_eq!(
            plan.get(TriggerKind::Daily).unwrap().fire_at(),
            Utc.with_ymd_and_hms(2024, 1, 6, 20, 30, 0).unwrap()
        );
    }

    #[test]
    fn capacity_assessment() {
        let policy = CapacityPolicy::default();
        assert_eq!(policy.assess(0, 2), CapacityStatus::Ok);
        assert_eq!(policy.assess(59, 2), CapacityStatus::Ok);
        assert_eq!(policy.assess(60, 2), CapacityStatus::Approaching);
        assert_eq!(policy.assess(62, 2), CapacityStatus::Approaching);
        assert_eq!(policy.assess(63, 2), CapacityStatus::Exceeded);
        assert_eq!(assess_capacity(8, 2, 10), CapacityStatus::Approaching);
        assert_eq!(assess_capacity(2, 2, 10), CapacityStatus::Ok);
    }

    #[test]
    fn trigger_kind_parses_wire_names() {
        for kind in TriggerKind::ALL {
            assert_eq!(kind.as_str().parse::<TriggerKind>(), Ok(kind));
        }
        assert!("finalDay".parse::<TriggerKind>().is_err());
    }
}
