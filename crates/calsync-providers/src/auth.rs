//! Authenticated request dispatch.
//!
//! [`AuthorizedTransport`] is the only place that reacts to 401 responses:
//! it attaches the bearer token, and on a 401 performs exactly one
//! (single-flight) refresh followed by exactly one retry.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::google::TokenManager;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

const UNAUTHORIZED: u16 = 401;

/// Sends requests with the token manager's bearer token.
pub struct AuthorizedTransport {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
}

impl AuthorizedTransport {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: Arc<TokenManager>) -> Self {
        Self { transport, tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Sends `request`, refreshing the token once if the provider answers 401.
    ///
    /// Any other status is returned as-is for the caller to interpret. A 401
    /// after the refresh fails with
    /// [`AuthenticationFailed`](crate::ProviderErrorCode::AuthenticationFailed).
    pub async fn send(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        let grant = self.tokens.bearer()?;
        let response = self
            .transport
            .request(request.clone().with_bearer(&grant.access_token))
            .await?;
        if response.status != UNAUTHORIZED {
            return Ok(response);
        }

        debug!(url = %request.url, "request unauthorized, refreshing access token");
        let grant = self.tokens.refresh_after(grant.generation).await?;
        let response = self
            .transport
            .request(request.with_bearer(&grant.access_token))
            .await?;
        if response.status == UNAUTHORIZED {
            warn!("request still unauthorized after token refresh");
            return Err(ProviderError::authentication(format!(
                "unauthorized after token refresh: {}",
                response.describe_error()
            ))
            .with_status(UNAUTHORIZED)
            .with_provider(self.tokens.provider()));
        }
        Ok(response)
    }
}
