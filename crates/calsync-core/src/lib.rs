//! Core types: events, zoned time, recurrence, settings, tracing

pub mod config;
pub mod event;
pub mod notification;
pub mod recurrence;
pub mod suggestion;
pub mod time;
pub mod tracing;

pub use config::{PRIMARY_CALENDAR, SettingsError, SyncSettings, SyncSettingsOverride};
pub use event::{
    Attendee, Event, EventStatus, ExternalRef, Reminder, ResponseStatus, ValidationIssue,
    Visibility,
};
pub use notification::NotificationOptions;
pub use recurrence::{Frequency, RecurrenceEnd, RecurrenceRule, WeekdayKey};
pub use suggestion::{EventSuggestion, Suggestion, TaskSuggestion};
pub use time::ZonedTime;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
