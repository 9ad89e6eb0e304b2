//! # Stillness Core Library
//!
//! This library provides the core logic for Stillness, a quiet countdown app.
//! Everything the app shows or schedules is derived here; the mobile client,
//! the home-screen widget and the `stillness` CLI are thin layers over it.
//!
//! ## Architecture
//!
//! - **Countdown**: Pure time math, text formatting and progress, re-run on
//!   every one-second tick against the wall clock
//! - **Notify**: Reminder planning and the cancel-then-recreate trigger
//!   lifecycle over an async scheduler capability
//! - **Storage**: SQLite event store and local scheduler, TOML configuration
//! - **Widget**: Payload contract and timeline for the home-screen widget
//!
//! ## Key Components
//!
//! - [`NotificationPlanner`]: Which triggers an event should have right now
//! - [`EventLifecycleCoordinator`]: Keeps one live trigger set per event
//! - [`CountdownService`]: Event list plus scheduling, widget and premium gate
//! - [`Config`]: Application configuration management

pub mod capability;
pub mod countdown;
pub mod error;
pub mod event;
pub mod notify;
pub mod premium;
pub mod service;
pub mod storage;
pub mod widget;

pub use capability::{Capability, CapabilityCell, UnavailableReason};
pub use countdown::{format_countdown, progress, CountdownTicker, Direction, TimeParts};
pub use error::{ConfigError, CoreError, NotifyError, StorageError, ValidationError, WidgetError};
pub use event::{CountdownEvent, CountdownFormat, CountdownMode, EventDraft, EventPatch, Mood};
pub use notify::{
    EventLifecycleCoordinator, NotificationPlanner, NotificationPreferences,
    NotificationScheduler, ScheduleOutcome,
};
pub use premium::PremiumGate;
pub use service::{CountdownService, EventBook};
pub use storage::{Config, Database, EventStore, LocalScheduler, SqliteEventStore};
pub use widget::{WidgetHost, WidgetPayload, WidgetSync};
