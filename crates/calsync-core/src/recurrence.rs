//! Recurrence rules attached to events.
//!
//! Rules are stored structurally. Expansion into occurrences is delegated to
//! the provider; locally only the base occurrence is ever compared.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// How often a recurring event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// When a recurrence stops producing occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceEnd {
    /// Last occurrence is on or before this date.
    On { date: NaiveDate },
    /// Stops after this many occurrences.
    After { count: u32 },
}

/// A recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Repeat every `interval` periods. Always at least 1.
    pub interval: u32,
    /// Weekdays the event repeats on. Only meaningful for weekly rules.
    #[serde(default)]
    pub days_of_week: BTreeSet<WeekdayKey>,
    /// `None` repeats forever.
    #[serde(default)]
    pub end: Option<RecurrenceEnd>,
}

impl RecurrenceRule {
    /// Creates a rule repeating every period with no end.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: BTreeSet::new(),
            end: None,
        }
    }

    /// Sets the interval. Zero is clamped to 1.
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds a weekday.
    pub fn on_day(mut self, day: Weekday) -> Self {
        self.days_of_week.insert(WeekdayKey(day));
        self
    }

    /// Sets the end condition.
    pub fn with_end(mut self, end: RecurrenceEnd) -> Self {
        self.end = Some(end);
        self
    }

    /// Returns the weekdays in Monday-first order.
    ///
    /// Empty for non-weekly rules regardless of what is stored.
    pub fn weekdays(&self) -> Vec<Weekday> {
        if self.frequency != Frequency::Weekly {
            return Vec::new();
        }
        self.days_of_week.iter().map(|d| d.0).collect()
    }
}

/// A [`Weekday`] ordered Monday first, usable as a set key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdayKey(pub Weekday);

impl PartialOrd for WeekdayKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeekdayKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .num_days_from_monday()
            .cmp(&other.0.num_days_from_monday())
    }
}

impl From<Weekday> for WeekdayKey {
    fn from(day: Weekday) -> Self {
        Self(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped() {
        let rule = RecurrenceRule::new(Frequency::Daily).with_interval(0);
        assert_eq!(rule.interval, 1);
    }

    #[test]
    fn weekdays_sorted_monday_first() {
        let rule = RecurrenceRule::new(Frequency::Weekly)
            .on_day(Weekday::Sun)
            .on_day(Weekday::Wed)
            .on_day(Weekday::Mon)
            .on_day(Weekday::Wed);
        assert_eq!(rule.weekdays(), vec![Weekday::Mon, Weekday::Wed, Weekday::Sun]);
    }

    #[test]
    fn weekdays_ignored_for_monthly() {
        let rule = RecurrenceRule::new(Frequency::Monthly).on_day(Weekday::Fri);
        assert!(rule.weekdays().is_empty());
    }

    #[test]
    fn end_serializes_tagged() {
        let end = RecurrenceEnd::After { count: 5 };
        let json = serde_json::to_value(end).unwrap();
        assert_eq!(json, serde_json::json!({"type": "after", "count": 5}));
    }
}
