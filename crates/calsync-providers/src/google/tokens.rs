//! OAuth token lifecycle.
//!
//! [`TokenManager`] owns one [`ProviderConnection`] and moves it through
//! its states:
//!
//! ```text
//! Unconfigured → Unauthenticated → Authenticated ⇄ Authenticating
//!                      ↑                                 │
//!                      └──────── refresh rejected ───────┘
//!                         revoke() from any state → Revoked
//! ```
//!
//! `Authenticating` is not stored. It is reported while the refresh guard is
//! held, so a refresh future dropped halfway cannot leave the manager stuck
//! in it.
//!
//! Every token swap bumps a generation counter. A caller that saw a 401
//! with generation `g` calls [`TokenManager::refresh_after`] with `g`; once
//! it holds the guard, a counter past `g` means someone else already
//! refreshed and the new token is reused.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::transport::{HttpRequest, HttpTransport};

use super::config::{ConnectionConfig, OAuthEndpoints};
use super::oauth::{PkceFlow, TokenResponse};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No client credentials.
    Unconfigured,
    /// Credentials present, no access token.
    Unauthenticated,
    /// A refresh or code exchange is in flight.
    Authenticating,
    /// Access token present, possibly expired.
    Authenticated,
    /// Tokens revoked. Terminal.
    Revoked,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`TokenManager::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Ready to make authenticated requests.
    Connected,
    /// The user must visit `authorization_url` and hand back the code.
    RequiresAuth { authorization_url: String },
    /// Client credentials must be configured first.
    RequiresSetup,
}

/// Credentials and tokens for one provider account.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConnection {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProviderConnection {
    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.expires_at = None;
    }
}

impl fmt::Debug for ProviderConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConnection")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An access token plus the generation it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerGrant {
    pub access_token: String,
    pub generation: u64,
}

struct Inner {
    provider: String,
    connection: Option<ProviderConnection>,
    /// PKCE state of an authorization that has not been exchanged yet.
    pending: Option<PkceFlow>,
    generation: u64,
    revoked: bool,
    /// Generation whose refresh was rejected, with the provider's status and
    /// message.
    rejection: Option<(u64, u16, String)>,
}

impl Inner {
    fn active_connection(&self) -> ProviderResult<&ProviderConnection> {
        if self.revoked {
            return Err(ProviderError::authentication(
                "connection was revoked; re-authorization required",
            )
            .with_provider(&self.provider));
        }
        self.connection.as_ref().ok_or_else(|| {
            ProviderError::configuration("connection is not configured")
                .with_provider(&self.provider)
        })
    }
}

/// Owns a provider connection and every change to its tokens.
pub struct TokenManager {
    endpoints: OAuthEndpoints,
    transport: Arc<dyn HttpTransport>,
    inner: Mutex<Inner>,
    /// Held across the token endpoint round-trip. Only one refresh or code
    /// exchange runs at a time.
    refresh_guard: tokio::sync::Mutex<()>,
}

impl TokenManager {
    pub fn new(endpoints: OAuthEndpoints, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoints,
            transport,
            inner: Mutex::new(Inner {
                provider: "google".to_string(),
                connection: None,
                pending: None,
                generation: 0,
                revoked: false,
                rejection: None,
            }),
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the provider tag.
    pub fn provider(&self) -> String {
        self.lock().provider.clone()
    }

    pub fn state(&self) -> ConnectionState {
        let inner = self.lock();
        if inner.revoked {
            return ConnectionState::Revoked;
        }
        let Some(connection) = inner.connection.as_ref() else {
            return ConnectionState::Unconfigured;
        };
        if self.refresh_guard.try_lock().is_err() {
            ConnectionState::Authenticating
        } else if connection.access_token.is_some() {
            ConnectionState::Authenticated
        } else {
            ConnectionState::Unauthenticated
        }
    }

    /// Returns a snapshot of the connection, for persistence.
    pub fn connection(&self) -> Option<ProviderConnection> {
        self.lock().connection.clone()
    }

    /// Returns the CSRF state of the pending authorization, if any.
    ///
    /// Pass it to [`parse_callback`](super::parse_callback) to check the
    /// redirect.
    pub fn pending_state(&self) -> Option<String> {
        self.lock().pending.as_ref().map(|p| p.state.clone())
    }

    /// Returns true if the access token's known expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.lock()
            .connection
            .as_ref()
            .and_then(|c| c.expires_at)
            .is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns the current access token and its generation.
    pub fn bearer(&self) -> ProviderResult<BearerGrant> {
        let inner = self.lock();
        let connection = inner.active_connection()?;
        let access_token = connection.access_token.clone().ok_or_else(|| {
            ProviderError::authentication("not authenticated; authorization required")
                .with_provider(&inner.provider)
        })?;
        Ok(BearerGrant {
            access_token,
            generation: inner.generation,
        })
    }

    /// Installs a connection from configuration.
    pub fn connect(&self, config: ConnectionConfig) -> ProviderResult<ConnectOutcome> {
        let mut inner = self.lock();
        if inner.revoked {
            return Err(ProviderError::configuration(
                "connection was revoked; set up a new connection",
            )
            .with_provider(config.provider));
        }

        if !config.has_credentials() {
            if config.has_tokens() {
                warn!(provider = %config.provider, "tokens supplied without client credentials");
                return Err(ProviderError::configuration(
                    "tokens were supplied without client credentials and can never be refreshed or revoked",
                )
                .with_provider(config.provider));
            }
            info!(provider = %config.provider, "connection requires setup");
            inner.provider = config.provider;
            inner.connection = None;
            inner.pending = None;
            inner.generation += 1;
            return Ok(ConnectOutcome::RequiresSetup);
        }

        let ConnectionConfig {
            provider,
            client_id,
            client_secret,
            access_token,
            refresh_token,
            expires_at,
            redirect_uri,
            scopes,
        } = config;
        let client_id = client_id.unwrap_or_default();
        let client_secret = client_secret.unwrap_or_default();

        let outcome = if access_token.is_some() {
            inner.pending = None;
            ConnectOutcome::Connected
        } else {
            let pkce = PkceFlow::new();
            let authorization_url = pkce.build_auth_url(
                &self.endpoints.authorization,
                &client_id,
                &redirect_uri,
                &scopes,
            );
            inner.pending = Some(pkce);
            ConnectOutcome::RequiresAuth { authorization_url }
        };

        info!(
            provider = %provider,
            connected = matches!(outcome, ConnectOutcome::Connected),
            "connection configured"
        );
        inner.connection = Some(ProviderConnection {
            provider: provider.clone(),
            client_id,
            client_secret,
            access_token,
            refresh_token,
            expires_at,
        });
        inner.provider = provider;
        inner.generation += 1;
        Ok(outcome)
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ProviderResult<()> {
        let _guard = self.refresh_guard.lock().await;

        let (provider, params, generation) = {
            let inner = self.lock();
            let connection = inner.active_connection()?;
            let mut params = vec![
                ("client_id", connection.client_id.clone()),
                ("client_secret", connection.client_secret.clone()),
                ("code", code.to_string()),
                ("grant_type", "authorization_code".to_string()),
                ("redirect_uri", redirect_uri.to_string()),
            ];
            if let Some(pkce) = &inner.pending {
                params.push(("code_verifier", pkce.verifier.clone()));
            }
            (inner.provider.clone(), params, inner.generation)
        };

        debug!(provider = %provider, "exchanging authorization code");
        let response = self
            .transport
            .request(HttpRequest::post(&self.endpoints.token).with_form(params))
            .await
            .map_err(|e| e.with_provider(&provider))?;

        if !response.is_success() {
            warn!(provider = %provider, status = response.status, "authorization code exchange failed");
            return Err(ProviderError::auth_exchange(response.describe_error())
                .with_status(response.status)
                .with_provider(provider));
        }
        let token = TokenResponse::from_response(&response).map_err(|e| e.with_provider(&provider))?;

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(
                ProviderError::configuration("connection changed during authorization")
                    .with_provider(provider),
            );
        }
        let expires_at = token.expires_at(Utc::now());
        if let Some(connection) = inner.connection.as_mut() {
            connection.access_token = Some(token.access_token);
            if token.refresh_token.is_some() {
                connection.refresh_token = token.refresh_token;
            }
            connection.expires_at = expires_at;
        }
        inner.pending = None;
        inner.generation += 1;
        info!(provider = %provider, "authorization complete");
        Ok(())
    }

    /// Exchanges the refresh token for a new access token.
    pub async fn refresh(&self) -> ProviderResult<()> {
        let _guard = self.refresh_guard.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless a refresh already happened after `observed_generation`.
    ///
    /// Concurrent callers that observed the same stale token share a single
    /// request to the token endpoint.
    pub async fn refresh_after(&self, observed_generation: u64) -> ProviderResult<BearerGrant> {
        let _guard = self.refresh_guard.lock().await;
        {
            let inner = self.lock();
            if inner.generation != observed_generation {
                if let Some(access_token) =
                    inner.connection.as_ref().and_then(|c| c.access_token.clone())
                {
                    debug!(provider = %inner.provider, "reusing token refreshed by a concurrent caller");
                    return Ok(BearerGrant {
                        access_token,
                        generation: inner.generation,
                    });
                }
                if let Some((generation, status, message)) = &inner.rejection
                    && *generation == inner.generation
                {
                    return Err(ProviderError::refresh_rejected(message.clone())
                        .with_status(*status)
                        .with_provider(&inner.provider));
                }
            }
        }
        self.refresh_locked().await?;
        self.bearer()
    }

    /// Caller must hold `refresh_guard`.
    async fn refresh_locked(&self) -> ProviderResult<()> {
        let (provider, params, generation) = {
            let inner = self.lock();
            let connection = inner.active_connection()?;
            let refresh_token = connection
                .refresh_token
                .clone()
                .ok_or_else(|| ProviderError::no_refresh_token().with_provider(&inner.provider))?;
            let params = vec![
                ("client_id", connection.client_id.clone()),
                ("client_secret", connection.client_secret.clone()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token".to_string()),
            ];
            (inner.provider.clone(), params, inner.generation)
        };

        debug!(provider = %provider, "refreshing access token");
        let response = self
            .transport
            .request(HttpRequest::post(&self.endpoints.token).with_form(params))
            .await
            .map_err(|e| e.with_provider(&provider))?;

        if !response.is_success() {
            let message = response.describe_error();
            if matches!(response.status, 400 | 401) {
                let mut inner = self.lock();
                if inner.generation == generation {
                    if let Some(connection) = inner.connection.as_mut() {
                        connection.clear_tokens();
                    }
                    inner.generation += 1;
                    inner.rejection = Some((inner.generation, response.status, message.clone()));
                }
                warn!(provider = %provider, status = response.status, "refresh token rejected; re-authorization required");
                return Err(ProviderError::refresh_rejected(message)
                    .with_status(response.status)
                    .with_provider(provider));
            }
            warn!(provider = %provider, status = response.status, "token refresh failed");
            return Err(ProviderError::provider_request(response.status, message)
                .with_provider(provider));
        }
        let token = TokenResponse::from_response(&response).map_err(|e| e.with_provider(&provider))?;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(provider = %provider, "connection changed during refresh, discarding token");
            return Ok(());
        }
        let rotated = token.refresh_token.is_some();
        let expires_at = token.expires_at(Utc::now());
        if let Some(connection) = inner.connection.as_mut() {
            connection.access_token = Some(token.access_token);
            if rotated {
                connection.refresh_token = token.refresh_token;
            }
            connection.expires_at = expires_at;
        }
        inner.generation += 1;
        info!(provider = %provider, rotated, "access token refreshed");
        Ok(())
    }

    /// Disconnects: clears local tokens and revokes them at the provider.
    ///
    /// The local part always happens. A failed revocation request is only
    /// logged.
    pub async fn revoke(&self) {
        let (provider, token) = {
            let mut inner = self.lock();
            let token = inner.connection.as_mut().and_then(|connection| {
                let token = connection
                    .refresh_token
                    .clone()
                    .or_else(|| connection.access_token.clone());
                connection.clear_tokens();
                token
            });
            inner.pending = None;
            inner.revoked = true;
            inner.generation += 1;
            (inner.provider.clone(), token)
        };
        info!(provider = %provider, "connection revoked");

        let Some(token) = token else {
            return;
        };
        let request = HttpRequest::post(&self.endpoints.revocation).with_form([("token", token)]);
        match self.transport.request(request).await {
            Ok(response) if response.is_success() => {
                debug!(provider = %provider, "token revoked at provider");
            }
            Ok(response) => {
                warn!(
                    provider = %provider,
                    status = response.status,
                    error = %response.describe_error(),
                    "token revocation failed"
                );
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "token revocation request failed");
            }
        }
    }

    /// Makes one cheap authenticated request. Never refreshes.
    pub async fn test_connection(&self) -> bool {
        let (provider, token) = {
            let inner = self.lock();
            let token = inner
                .active_connection()
                .ok()
                .and_then(|c| c.access_token.clone());
            (inner.provider.clone(), token)
        };
        let Some(token) = token else {
            return false;
        };

        match self
            .transport
            .request(HttpRequest::get(&self.endpoints.probe).with_bearer(&token))
            .await
        {
            Ok(response) => {
                debug!(provider = %provider, status = response.status, "connection test");
                response.is_success()
            }
            Err(e) => {
                debug!(provider = %provider, error = %e, "connection test failed");
                false
            }
        }
    }
}
