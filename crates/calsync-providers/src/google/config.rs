//! Connection configuration for the Google provider.

use calsync_core::SyncSettings;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 endpoints used by the token manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    /// Consent page the user is sent to.
    pub authorization: String,
    /// Code exchange and refresh.
    pub token: String,
    /// Token revocation.
    pub revocation: String,
    /// Cheap authenticated GET used by `test_connection`.
    pub probe: String,
}

impl OAuthEndpoints {
    /// Google's production endpoints.
    pub fn google() -> Self {
        Self {
            authorization: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            revocation: "https://oauth2.googleapis.com/revoke".to_string(),
            probe: "https://www.googleapis.com/calendar/v3/users/me/calendarList?maxResults=1"
                .to_string(),
        }
    }
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self::google()
    }
}

/// Input to [`TokenManager::connect`](super::TokenManager::connect).
///
/// Client credentials come from the Google Cloud Console; tokens, when
/// present, come from a previously persisted connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Provider tag stamped on mirrored events and errors.
    pub provider: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Redirect URI registered with the OAuth client.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let settings = SyncSettings::default();
        Self {
            provider: "google".to_string(),
            client_id: None,
            client_secret: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            redirect_uri: settings.redirect_uri,
            scopes: settings.scopes,
        }
    }
}

/// Structure of Google's OAuth client JSON file.
///
/// The Cloud Console nests the values under `installed` or `web`; other
/// tools write them at the root.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl ConnectionConfig {
    /// Creates an empty configuration for the given provider tag.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Takes the redirect URI and scopes from resolved settings.
    pub fn with_settings(mut self, settings: &SyncSettings) -> Self {
        self.redirect_uri = settings.redirect_uri.clone();
        self.scopes = settings.scopes.clone();
        self
    }

    /// Sets the OAuth client credentials.
    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Reads the OAuth client credentials from a Google credentials JSON
    /// document.
    pub fn with_credentials_json(self, json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
                .with_source(e)
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(self.with_credentials(creds.client_id, creds.client_secret));
        }
        if let (Some(id), Some(secret)) = (file.client_id, file.client_secret) {
            return Ok(self.with_credentials(id, secret));
        }
        Err(ProviderError::configuration(
            "credentials must contain an 'installed' or 'web' section, or 'client_id' and 'client_secret'",
        ))
    }

    /// Sets previously obtained tokens.
    pub fn with_tokens(
        mut self,
        access_token: Option<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.expires_at = expires_at;
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Returns true when both client id and secret are non-empty.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.client_id) && present(&self.client_secret)
    }

    /// Returns true when any token was supplied.
    pub fn has_tokens(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}
