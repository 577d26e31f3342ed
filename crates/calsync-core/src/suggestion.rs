//! Suggested items that can be accepted into the calendar or task list.
//!
//! A suggestion is a tagged union: the `kind` discriminator decides which
//! payload shape follows.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::time::ZonedTime;

/// A suggestion for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form priority hint (e.g. `"high"`).
    #[serde(default)]
    pub priority: Option<String>,
}

/// A suggestion for a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSuggestion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: ZonedTime,
    pub end: ZonedTime,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
}

/// Either kind of suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Suggestion {
    Task(TaskSuggestion),
    Event(EventSuggestion),
}

impl Suggestion {
    /// Returns the title shared by every kind.
    pub fn title(&self) -> &str {
        match self {
            Self::Task(t) => &t.title,
            Self::Event(e) => &e.title,
        }
    }

    /// Converts an event suggestion into a local event. Tasks yield `None`.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Task(_) => None,
            Self::Event(e) => Some(e.into_event()),
        }
    }
}

impl EventSuggestion {
    /// Converts the suggestion into a local event.
    pub fn into_event(self) -> Event {
        let mut event = if self.is_all_day {
            let end_day = self.end.instant.with_timezone(&self.start.tz).date_naive();
            Event::all_day(self.title, self.start.date(), end_day, self.start.tz)
        } else {
            Event::timed(self.title, self.start, self.end)
        };
        event.description = self.description;
        event.location = self.location;
        event
    }

    /// Returns the timezone the suggestion was made in.
    pub fn tz(&self) -> Tz {
        self.start.tz
    }
}
