//! Scripted transport for tests.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Notify;

use crate::error::ProviderResult;
use crate::provider::BoxFuture;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

pub(crate) const TOKEN_URL: &str = "https://oauth.test/token";
pub(crate) const REVOKE_URL: &str = "https://oauth.test/revoke";
pub(crate) const PROBE_URL: &str = "https://api.test/calendar/v3/users/me/calendarList";
pub(crate) const API_BASE: &str = "https://api.test/calendar/v3";

type Handler = dyn Fn(&HttpRequest) -> ProviderResult<HttpResponse> + Send + Sync;

/// Answers every request with a closure and records what was sent.
///
/// With a token gate set, requests to the token endpoint park until the
/// gate is notified.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    log: Mutex<Vec<HttpRequest>>,
    token_gate: Option<Arc<Notify>>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest) -> ProviderResult<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
            token_gate: None,
        }
    }

    pub(crate) fn with_token_gate(mut self, gate: Arc<Notify>) -> Self {
        self.token_gate = Some(gate);
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn token_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == TOKEN_URL)
            .collect()
    }

    pub(crate) fn api_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(API_BASE))
            .collect()
    }
}

impl HttpTransport for MockTransport {
    fn request(&self, request: HttpRequest) -> BoxFuture<'_, ProviderResult<HttpResponse>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(request.clone());
            if request.url == TOKEN_URL
                && let Some(gate) = &self.token_gate
            {
                gate.notified().await;
            }
            (self.handler)(&request)
        })
    }
}

pub(crate) fn reply(status: u16, json: Value) -> ProviderResult<HttpResponse> {
    Ok(HttpResponse::new(status, Some(json)))
}

pub(crate) fn empty(status: u16) -> ProviderResult<HttpResponse> {
    Ok(HttpResponse::new(status, None))
}

pub(crate) fn unauthorized() -> ProviderResult<HttpResponse> {
    reply(
        401,
        serde_json::json!({"error": {"code": 401, "message": "Invalid Credentials"}}),
    )
}

pub(crate) fn test_endpoints() -> crate::google::OAuthEndpoints {
    crate::google::OAuthEndpoints {
        authorization: "https://oauth.test/auth".to_string(),
        token: TOKEN_URL.to_string(),
        revocation: REVOKE_URL.to_string(),
        probe: PROBE_URL.to_string(),
    }
}
