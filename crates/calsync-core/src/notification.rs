//! Reminder notification payloads.
//!
//! Known options are named fields; anything else a caller attaches survives
//! in [`NotificationOptions::extensions`] and is written back unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Options for a reminder notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_interaction: Option<bool>,
    /// Custom keys not known to this version.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl NotificationOptions {
    /// Builds the notification shown for an event's reminder.
    pub fn for_event(event: &Event, minutes_before_start: u32) -> Self {
        let lead = match minutes_before_start {
            0 => "starting now".to_string(),
            1 => "in 1 minute".to_string(),
            n => format!("in {} minutes", n),
        };
        let mut body = lead;
        if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
            body.push_str(" at ");
            body.push_str(location);
        }
        Self {
            title: Some(event.title.clone()),
            body: Some(body),
            ..Default::default()
        }
    }

    /// Reads a custom key.
    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.get(key)
    }
}
