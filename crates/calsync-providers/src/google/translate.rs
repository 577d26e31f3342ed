//! Conversion between canonical events and Google Calendar event resources.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use calsync_core::{
    Attendee, Event, EventStatus, ExternalRef, Frequency, RecurrenceEnd, RecurrenceRule, Reminder,
    ResponseStatus, Visibility, ZonedTime,
};

use crate::provider::FormatTranslator;

/// Title given to events that arrive without one.
pub const UNTITLED: &str = "(No title)";

/// Google's event color palette: `colorId`, hex, RGB.
const PALETTE: [(&str, &str, [u8; 3]); 11] = [
    ("1", "#a4bdfc", [0xa4, 0xbd, 0xfc]),
    ("2", "#7ae7bf", [0x7a, 0xe7, 0xbf]),
    ("3", "#dbadff", [0xdb, 0xad, 0xff]),
    ("4", "#ff887c", [0xff, 0x88, 0x7c]),
    ("5", "#fbd75b", [0xfb, 0xd7, 0x5b]),
    ("6", "#ffb878", [0xff, 0xb8, 0x78]),
    ("7", "#46d6db", [0x46, 0xd6, 0xdb]),
    ("8", "#e1e1e1", [0xe1, 0xe1, 0xe1]),
    ("9", "#5484ed", [0x54, 0x84, 0xed]),
    ("10", "#51b749", [0x51, 0xb7, 0x49]),
    ("11", "#dc2127", [0xdc, 0x21, 0x27]),
];

/// A Google Calendar event resource, limited to the fields we sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<WireDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<WireDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<WireReminders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<WireAttendee>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// `start` / `end` of an event: `date` for all-day events, `dateTime`
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireReminders {
    pub use_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<WireReminder>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireReminder {
    pub method: String,
    pub minutes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireAttendee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

/// Translator for Google Calendar event resources.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    provider: String,
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new("google")
    }
}

impl GoogleTranslator {
    /// Creates a translator that tags mirrored events with `provider`.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl FormatTranslator for GoogleTranslator {
    type Wire = WireEvent;

    fn to_external(&self, event: &Event) -> WireEvent {
        let reminders = (!event.reminders.is_empty()).then(|| WireReminders {
            use_default: false,
            overrides: Some(
                event
                    .reminders
                    .iter()
                    .map(|r| WireReminder {
                        method: "popup".to_string(),
                        minutes: i64::from(r.minutes_before_start),
                    })
                    .collect(),
            ),
        });

        let attendees = (!event.attendees.is_empty())
            .then(|| event.attendees.iter().map(attendee_to_wire).collect());

        WireEvent {
            id: event.external_id().map(str::to_string),
            summary: Some(event.title.clone()),
            description: event.description.clone(),
            location: event.location.clone(),
            start: event.start.map(|t| time_to_wire(t, event.is_all_day)),
            end: event.end.map(|t| time_to_wire(t, event.is_all_day)),
            status: Some(status_to_wire(event.status).to_string()),
            visibility: Some(visibility_to_wire(event.visibility).to_string()),
            color_id: event
                .color
                .as_deref()
                .and_then(color_to_id)
                .map(str::to_string),
            reminders,
            attendees,
            recurrence: event
                .recurrence
                .as_ref()
                .map(|rule| vec![format_rrule(rule, event.is_all_day)]),
            created: Some(timestamp_to_wire(event.created_at)),
            updated: Some(timestamp_to_wire(event.updated_at)),
        }
    }

    fn to_internal(&self, wire: &WireEvent) -> Event {
        let title = wire
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(UNTITLED);
        let mut event = Event::new(title);

        if let Some(id) = wire.id.as_deref().filter(|id| !id.is_empty()) {
            event.id = Event::mirror_id(&self.provider, id);
            event.external = Some(ExternalRef::new(self.provider.as_str(), id));
        }

        let date_only =
            |t: &Option<WireDateTime>| t.as_ref().is_some_and(|t| t.date_time.is_none() && t.date.is_some());
        event.is_all_day = date_only(&wire.start) && date_only(&wire.end);
        event.start = wire.start.as_ref().and_then(time_from_wire);
        event.end = wire.end.as_ref().and_then(time_from_wire);

        event.description = wire.description.clone();
        event.location = wire.location.clone();
        event.status = wire
            .status
            .as_deref()
            .map(status_from_wire)
            .unwrap_or_default();
        event.visibility = wire
            .visibility
            .as_deref()
            .map(visibility_from_wire)
            .unwrap_or_default();
        event.color = wire.color_id.as_deref().and_then(id_to_color);

        event.reminders = wire
            .reminders
            .as_ref()
            .and_then(|r| r.overrides.as_ref())
            .map(|overrides| {
                overrides
                    .iter()
                    .map(|r| Reminder::new(u32::try_from(r.minutes.max(0)).unwrap_or(u32::MAX)))
                    .collect()
            })
            .unwrap_or_default();

        event.attendees = wire
            .attendees
            .as_ref()
            .map(|attendees| attendees.iter().filter_map(attendee_from_wire).collect())
            .unwrap_or_default();

        event.recurrence = wire.recurrence.as_ref().and_then(|lines| {
            let line = lines.iter().find(|l| l.starts_with("RRULE:"))?;
            let rule = parse_rrule(line);
            if rule.is_none() {
                warn!(rule = %line, "ignoring unparseable recurrence rule");
            }
            rule
        });

        let now = Utc::now();
        let created = wire
            .created
            .as_deref()
            .and_then(timestamp_from_wire)
            .unwrap_or(now);
        let updated = wire
            .updated
            .as_deref()
            .and_then(timestamp_from_wire)
            .unwrap_or(created);
        event.with_audit(created, updated)
    }
}

fn time_to_wire(time: ZonedTime, all_day: bool) -> WireDateTime {
    let time_zone = Some(time.tz_name().to_string());
    if all_day {
        WireDateTime {
            date: Some(time.date().format("%Y-%m-%d").to_string()),
            date_time: None,
            time_zone,
        }
    } else {
        WireDateTime {
            date: None,
            date_time: Some(time.local().to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            time_zone,
        }
    }
}

fn time_from_wire(wire: &WireDateTime) -> Option<ZonedTime> {
    let tz = match wire.time_zone.as_deref() {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(time_zone = name, "unknown time zone, using UTC");
            Tz::UTC
        }),
        None => Tz::UTC,
    };

    if let Some(date_time) = wire.date_time.as_deref() {
        return match DateTime::parse_from_rfc3339(date_time) {
            Ok(parsed) => Some(ZonedTime::new(parsed.with_timezone(&Utc), tz)),
            Err(e) => {
                warn!(date_time, error = %e, "malformed dateTime");
                None
            }
        };
    }

    let date = wire.date.as_deref()?;
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(day) => Some(ZonedTime::at_midnight(day, tz)),
        Err(e) => {
            warn!(date, error = %e, "malformed date");
            None
        }
    }
}

fn timestamp_to_wire(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn timestamp_from_wire(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn status_to_wire(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Confirmed => "confirmed",
        EventStatus::Tentative => "tentative",
        EventStatus::Cancelled => "cancelled",
    }
}

fn status_from_wire(status: &str) -> EventStatus {
    match status {
        "tentative" => EventStatus::Tentative,
        "cancelled" => EventStatus::Cancelled,
        _ => EventStatus::Confirmed,
    }
}

fn visibility_to_wire(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Private => "private",
    }
}

/// `default`, `private`, `confidential` and unknown values are all private.
fn visibility_from_wire(visibility: &str) -> Visibility {
    match visibility {
        "public" => Visibility::Public,
        _ => Visibility::Private,
    }
}

fn attendee_to_wire(attendee: &Attendee) -> WireAttendee {
    let response_status = match attendee.response_status {
        ResponseStatus::NeedsAction => "needsAction",
        ResponseStatus::Accepted => "accepted",
        ResponseStatus::Declined => "declined",
        ResponseStatus::Tentative => "tentative",
    };
    WireAttendee {
        email: Some(attendee.email.clone()),
        display_name: attendee.display_name.clone(),
        response_status: Some(response_status.to_string()),
    }
}

fn attendee_from_wire(wire: &WireAttendee) -> Option<Attendee> {
    let email = wire.email.as_deref().filter(|e| !e.is_empty())?;
    let response_status = match wire.response_status.as_deref() {
        Some("accepted") => ResponseStatus::Accepted,
        Some("declined") => ResponseStatus::Declined,
        Some("tentative") => ResponseStatus::Tentative,
        _ => ResponseStatus::NeedsAction,
    };
    Some(Attendee {
        email: email.to_string(),
        display_name: wire.display_name.clone().filter(|n| !n.is_empty()),
        response_status,
    })
}

fn parse_hex(color: &str) -> Option<[u8; 3]> {
    let hex = color.trim().strip_prefix('#').unwrap_or(color.trim());
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Maps a hex color to the closest palette entry.
fn color_to_id(color: &str) -> Option<&'static str> {
    let [r, g, b] = parse_hex(color)?;
    let distance = |rgb: &[u8; 3]| {
        let d = |a: u8, b: u8| (i32::from(a) - i32::from(b)).pow(2);
        d(r, rgb[0]) + d(g, rgb[1]) + d(b, rgb[2])
    };
    PALETTE
        .iter()
        .min_by_key(|(_, _, rgb)| distance(rgb))
        .map(|(id, _, _)| *id)
}

fn id_to_color(id: &str) -> Option<String> {
    PALETTE
        .iter()
        .find(|(palette_id, _, _)| *palette_id == id)
        .map(|(_, hex, _)| hex.to_string())
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Parses a BYDAY entry such as `MO` or `-1FR`, ignoring the ordinal.
fn weekday_from_code(code: &str) -> Option<Weekday> {
    let code = code.trim();
    match code.get(code.len().checked_sub(2)?..)? {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Formats a rule as an RFC 5545 `RRULE:` line.
///
/// `UNTIL` is a date for all-day events and the last second of that day in
/// UTC for timed ones.
pub fn format_rrule(rule: &RecurrenceRule, all_day: bool) -> String {
    let frequency = match rule.frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Monthly => "MONTHLY",
        Frequency::Yearly => "YEARLY",
    };
    let mut parts = vec![format!("FREQ={}", frequency)];
    if rule.interval > 1 {
        parts.push(format!("INTERVAL={}", rule.interval));
    }
    let days = rule.weekdays();
    if !days.is_empty() {
        let codes: Vec<&str> = days.into_iter().map(weekday_code).collect();
        parts.push(format!("BYDAY={}", codes.join(",")));
    }
    match rule.end {
        Some(RecurrenceEnd::On { date }) if all_day => {
            parts.push(format!("UNTIL={}", date.format("%Y%m%d")));
        }
        Some(RecurrenceEnd::On { date }) => {
            parts.push(format!("UNTIL={}T235959Z", date.format("%Y%m%d")));
        }
        Some(RecurrenceEnd::After { count }) => parts.push(format!("COUNT={}", count)),
        None => {}
    }
    format!("RRULE:{}", parts.join(";"))
}

/// Parses an `RRULE:` line. Returns `None` for anything we cannot represent.
pub fn parse_rrule(line: &str) -> Option<RecurrenceRule> {
    let body = line.trim().strip_prefix("RRULE:")?;
    let mut frequency = None;
    let mut rule_parts = Vec::new();

    for part in body.split(';').filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once('=')?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => {
                frequency = Some(match value.to_ascii_uppercase().as_str() {
                    "DAILY" => Frequency::Daily,
                    "WEEKLY" => Frequency::Weekly,
                    "MONTHLY" => Frequency::Monthly,
                    "YEARLY" => Frequency::Yearly,
                    _ => return None,
                });
            }
            _ => rule_parts.push((key.to_ascii_uppercase(), value)),
        }
    }

    let mut rule = RecurrenceRule::new(frequency?);
    for (key, value) in rule_parts {
        match key.as_str() {
            "INTERVAL" => rule = rule.with_interval(value.parse().ok()?),
            "BYDAY" => {
                for code in value.split(',') {
                    rule = rule.on_day(weekday_from_code(&code.to_ascii_uppercase())?);
                }
            }
            "UNTIL" => {
                let date = NaiveDate::parse_from_str(value.get(..8)?, "%Y%m%d").ok()?;
                rule = rule.with_end(RecurrenceEnd::On { date });
            }
            "COUNT" => {
                rule = rule.with_end(RecurrenceEnd::After {
                    count: value.parse().ok()?,
                });
            }
            _ => {}
        }
    }
    Some(rule)
}
