//! Google Calendar provider implementation.
//!
//! This module provides a [`GoogleCalendarAdapter`] that mirrors events to and
//! from Google Calendar using the Calendar API v3.
//!
//! # Authentication Flow
//!
//! 1. The caller supplies OAuth client credentials through [`ConnectionConfig`]
//! 2. [`TokenManager::connect`] returns a consent URL with a PKCE challenge
//! 3. The user grants access and lands on the redirect URI
//! 4. [`parse_callback`] extracts the code, checking the CSRF state
//! 5. [`TokenManager::exchange_code`] swaps it for access and refresh tokens
//! 6. The caller persists [`TokenManager::connection`] for the next run
//!
//! Access tokens are refreshed lazily: only a 401 from the API triggers a
//! refresh, shared by every request that hit it.
//!
//! # Example
//!
//! ```ignore
//! use calsync_providers::google::{
//!     ConnectionConfig, GoogleCalendarAdapter, OAuthEndpoints, TokenManager,
//! };
//!
//! let transport = Arc::new(ReqwestTransport::new(settings.request_timeout())?);
//! let tokens = Arc::new(TokenManager::new(OAuthEndpoints::google(), transport.clone()));
//! tokens.connect(config)?;
//!
//! let adapter = GoogleCalendarAdapter::with_settings(tokens, transport, &settings);
//! let pull = adapter.pull(None, settings.window_start(Utc::now()), settings.list_limit, &known).await?;
//! ```

mod adapter;
mod config;
mod oauth;
mod tokens;
mod translate;

pub use adapter::GoogleCalendarAdapter;
pub use config::{ConnectionConfig, OAuthEndpoints};
pub use oauth::{PkceFlow, TokenResponse, parse_callback};
pub use tokens::{BearerGrant, ConnectOutcome, ConnectionState, ProviderConnection, TokenManager};
pub use translate::{
    GoogleTranslator, UNTITLED, WireAttendee, WireDateTime, WireEvent, WireReminder,
    WireReminders, format_rrule, parse_rrule,
};
