//! The canonical calendar event.
//!
//! This module provides:
//! - [`Event`]: the provider-agnostic event every sync path converges on
//! - [`ExternalRef`]: the link between a local event and its provider record
//! - [`ValidationIssue`]: rule violations reported by [`Event::validate`]
//!
//! Times are [`ZonedTime`]s, so durations and conflicts are computed on
//! absolute instants no matter which zone each endpoint was authored in.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::recurrence::RecurrenceRule;
use crate::time::ZonedTime;

/// Confirmation status of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

/// Who can see the event details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// The response status for an event attendee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The attendee has not responded.
    #[default]
    NeedsAction,
    /// The attendee has accepted the invitation.
    Accepted,
    /// The attendee has declined the invitation.
    Declined,
    /// The attendee has tentatively accepted.
    Tentative,
}

/// A reminder fired some minutes before the event starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reminder {
    pub minutes_before_start: u32,
}

impl Reminder {
    pub fn new(minutes_before_start: u32) -> Self {
        Self {
            minutes_before_start,
        }
    }
}

/// An attendee of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// The attendee's email address.
    pub email: String,
    /// The attendee's display name, if available.
    pub display_name: Option<String>,
    /// The attendee's response status.
    pub response_status: ResponseStatus,
}

impl Attendee {
    /// Creates a new attendee with the given email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            response_status: ResponseStatus::NeedsAction,
        }
    }

    /// Builder method to set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Builder method to set the response status.
    pub fn with_response_status(mut self, status: ResponseStatus) -> Self {
        self.response_status = status;
        self
    }
}

/// Ties an event to exactly one external record.
///
/// Provider tag and external id travel together, so an event is either
/// fully local or fully mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    /// Which external system owns the record (e.g. `"google"`).
    pub provider: String,
    /// The provider's identifier for the record.
    pub external_id: String,
}

impl ExternalRef {
    pub fn new(provider: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            external_id: external_id.into(),
        }
    }
}

/// A rule violated by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("title is required")]
    TitleRequired,
    #[error("start date is required")]
    StartRequired,
    #[error("end must be after start")]
    EndNotAfterStart,
}

/// Namespace for ids derived from provider records.
const MIRROR_NAMESPACE: Uuid = Uuid::from_u128(0x6c61_7379_6e63_4d69_7272_6f72_4e53_0001);

/// A canonical calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable internal identifier.
    pub id: Uuid,
    /// The provider record this event mirrors, if any.
    pub external: Option<ExternalRef>,
    pub start: Option<ZonedTime>,
    pub end: Option<ZonedTime>,
    /// When set, only the calendar dates of `start` and `end` matter.
    pub is_all_day: bool,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
    pub status: EventStatus,
    pub visibility: Visibility,
    /// Display hint only.
    pub color: Option<String>,
    pub reminders: Vec<Reminder>,
    pub attendees: Vec<Attendee>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Creates a local event with no times set.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external: None,
            start: None,
            end: None,
            is_all_day: false,
            title: title.into(),
            description: None,
            location: None,
            recurrence: None,
            status: EventStatus::Confirmed,
            visibility: Visibility::Private,
            color: None,
            reminders: Vec::new(),
            attendees: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a local timed event.
    pub fn timed(title: impl Into<String>, start: ZonedTime, end: ZonedTime) -> Self {
        let mut event = Self::new(title);
        event.start = Some(start);
        event.end = Some(end);
        event
    }

    /// Creates a local all-day event spanning `first_day` up to, but not
    /// including, `end_day`. Both endpoints are anchored at local midnight.
    pub fn all_day(
        title: impl Into<String>,
        first_day: NaiveDate,
        end_day: NaiveDate,
        tz: Tz,
    ) -> Self {
        let mut event = Self::new(title);
        event.start = Some(ZonedTime::at_midnight(first_day, tz));
        event.end = Some(ZonedTime::at_midnight(end_day, tz));
        event.is_all_day = true;
        event
    }

    /// Returns the stable id for the local mirror of a provider record.
    ///
    /// The same provider and external id always yield the same id.
    pub fn mirror_id(provider: &str, external_id: &str) -> Uuid {
        Uuid::new_v5(
            &MIRROR_NAMESPACE,
            format!("{}:{}", provider, external_id).as_bytes(),
        )
    }

    /// Returns true if the event is not tied to any provider.
    pub fn is_local(&self) -> bool {
        self.external.is_none()
    }

    /// Returns the provider tag, if mirrored.
    pub fn provider(&self) -> Option<&str> {
        self.external.as_ref().map(|e| e.provider.as_str())
    }

    /// Returns the provider's id for this event, if mirrored.
    pub fn external_id(&self) -> Option<&str> {
        self.external.as_ref().map(|e| e.external_id.as_str())
    }

    /// Returns the duration in minutes, rounded to the nearest minute.
    ///
    /// Returns 0 when either endpoint is missing.
    pub fn duration_minutes(&self) -> i64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                let millis = (end.instant - start.instant).num_milliseconds();
                (millis as f64 / 60_000.0).round() as i64
            }
            _ => 0,
        }
    }

    /// Checks if the event is in progress at `now`. Both endpoints inclusive.
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start.instant <= now && now <= end.instant,
            _ => false,
        }
    }

    /// Checks if two events overlap in time.
    ///
    /// Events that merely touch (`a.end == b.start`) do not conflict. Only
    /// the base occurrence is compared; recurrence rules are not expanded.
    pub fn conflicts_with(&self, other: &Event) -> bool {
        match (self.start, self.end, other.start, other.end) {
            (Some(s1), Some(e1), Some(s2), Some(e2)) => {
                s1.instant < e2.instant && s2.instant < e1.instant
            }
            _ => false,
        }
    }

    /// Renders the time range in the start's timezone.
    ///
    /// Same-day timed events collapse to `"Jan 2, 2024 9:00 AM – 9:15 AM"`.
    /// All-day events render dates only, with an inclusive last day.
    pub fn formatted_range(&self) -> String {
        const DATE: &str = "%b %-d, %Y";
        const TIME: &str = "%-I:%M %p";

        let (Some(start), Some(end)) = (self.start, self.end) else {
            return String::new();
        };
        let tz = start.tz;
        let start_local = start.local();
        let end_local = end.instant.with_timezone(&tz);

        if self.is_all_day {
            let first = start_local.date_naive();
            let mut last = end_local.date_naive();
            if last > first {
                last = last - Duration::days(1);
            }
            if last <= first {
                return first.format(DATE).to_string();
            }
            return format!("{} – {}", first.format(DATE), last.format(DATE));
        }

        if start_local.date_naive() == end_local.date_naive() {
            format!(
                "{} {} – {}",
                start_local.format(DATE),
                start_local.format(TIME),
                end_local.format(TIME)
            )
        } else {
            format!(
                "{} {} – {} {}",
                start_local.format(DATE),
                start_local.format(TIME),
                end_local.format(DATE),
                end_local.format(TIME)
            )
        }
    }

    /// Returns every rule the event violates, in a fixed order.
    ///
    /// Never fails; an empty list means the event is valid.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.title.trim().is_empty() {
            issues.push(ValidationIssue::TitleRequired);
        }
        if self.start.is_none() {
            issues.push(ValidationIssue::StartRequired);
        }
        if let (Some(start), Some(end)) = (self.start, self.end)
            && end.instant <= start.instant
        {
            issues.push(ValidationIssue::EndNotAfterStart);
        }
        issues
    }

    /// Advances `updated_at` to `now`. Never moves it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Overwrites the mirrored fields with those of a freshly pulled copy.
    ///
    /// Identity and `created_at` are kept; `updated_at` is refreshed.
    pub fn apply_pull(&mut self, pulled: &Event, now: DateTime<Utc>) {
        self.external = pulled.external.clone();
        self.start = pulled.start;
        self.end = pulled.end;
        self.is_all_day = pulled.is_all_day;
        self.title = pulled.title.clone();
        self.description = pulled.description.clone();
        self.location = pulled.location.clone();
        self.recurrence = pulled.recurrence.clone();
        self.status = pulled.status;
        self.visibility = pulled.visibility;
        self.color = pulled.color.clone();
        self.reminders = pulled.reminders.clone();
        self.attendees = pulled.attendees.clone();
        self.touch(now);
    }

    /// Builder method to set the id.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Builder method to tie the event to a provider record.
    pub fn with_external(
        mut self,
        provider: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        self.external = Some(ExternalRef::new(provider, external_id));
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Builder method to set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Builder method to append a reminder.
    pub fn with_reminder(mut self, minutes_before_start: u32) -> Self {
        self.reminders.push(Reminder::new(minutes_before_start));
        self
    }

    /// Builder method to append an attendee.
    pub fn with_attendee(mut self, attendee: Attendee) -> Self {
        self.attendees.push(attendee);
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    /// Builder method to set both audit timestamps.
    ///
    /// `updated` is raised to `created` if it is earlier.
    pub fn with_audit(mut self, created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
        self.created_at = created;
        self.updated_at = updated.max(created);
        self
    }
}
