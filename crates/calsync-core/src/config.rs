//! Sync settings.
//!
//! Settings are resolved explicitly: a fully populated [`SyncSettings`]
//! (usually [`SyncSettings::default`]) is combined with a partial
//! [`SyncSettingsOverride`], typically read from
//! `~/.config/calsync/config.toml`. Every field of the override that is set
//! wins; every field that is absent keeps the base value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of the account's primary calendar.
pub const PRIMARY_CALENDAR: &str = "primary";

/// Errors loading settings from disk.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Fully resolved sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Calendar used when a call does not name one.
    pub calendar_id: String,

    /// Maximum number of events returned by one pull.
    pub list_limit: usize,

    /// How far before "now" a pull window starts, in hours.
    pub lookback_hours: i64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Base URL of the calendar API.
    pub api_base: String,

    /// OAuth scopes requested during authorization.
    pub scopes: Vec<String>,

    /// Redirect URI registered with the OAuth client.
    pub redirect_uri: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            calendar_id: PRIMARY_CALENDAR.to_string(),
            list_limit: 250,
            lookback_hours: 24,
            request_timeout_secs: 30,
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
            redirect_uri: "http://127.0.0.1:8080/callback".to_string(),
        }
    }
}

/// A partial set of settings. Absent fields leave the base untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettingsOverride {
    pub calendar_id: Option<String>,
    pub list_limit: Option<usize>,
    pub lookback_hours: Option<i64>,
    pub request_timeout_secs: Option<u64>,
    pub api_base: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub redirect_uri: Option<String>,
}

impl SyncSettings {
    /// Combines `base` with `overrides`.
    pub fn resolve(base: SyncSettings, overrides: SyncSettingsOverride) -> SyncSettings {
        SyncSettings {
            calendar_id: overrides.calendar_id.unwrap_or(base.calendar_id),
            list_limit: overrides.list_limit.unwrap_or(base.list_limit),
            lookback_hours: overrides.lookback_hours.unwrap_or(base.lookback_hours),
            request_timeout_secs: overrides
                .request_timeout_secs
                .unwrap_or(base.request_timeout_secs),
            api_base: overrides.api_base.unwrap_or(base.api_base),
            scopes: overrides.scopes.unwrap_or(base.scopes),
            redirect_uri: overrides.redirect_uri.unwrap_or(base.redirect_uri),
        }
    }

    /// Loads settings from the default path, falling back to defaults when
    /// no file exists.
    pub fn load() -> Result<Self, SettingsError> {
        let path = Self::default_path();
        let overrides = if path.exists() {
            SyncSettingsOverride::load_from(&path)?
        } else {
            SyncSettingsOverride::default()
        };
        Ok(Self::resolve(Self::default(), overrides))
    }

    /// Returns the default settings file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsync")
            .join("config.toml")
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the start of the pull window for `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::hours(self.lookback_hours)
    }
}

impl SyncSettingsOverride {
    /// Parses an override from TOML.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads an override from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}
