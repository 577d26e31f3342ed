//! HTTP transport seam.
//!
//! The token manager and the sync adapter never talk to `reqwest` directly;
//! they go through [`HttpTransport`], which takes a fully described
//! [`HttpRequest`] and yields the status plus the decoded JSON body. Tests
//! swap in scripted transports.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

/// HTTP methods used by the adapter and the token manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

/// A single outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Sets a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Sets the `Authorization: Bearer` header.
    pub fn with_bearer(self, access_token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", access_token))
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_form<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(RequestBody::Form(params));
        self
    }

    /// Returns a header value, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the bearer token attached to this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("Authorization")?.strip_prefix("Bearer ")
    }

    /// Returns a form field, if the body is a form.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            Some(RequestBody::Form(params)) => params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// A response: status plus the JSON body, if the body was JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub json: Option<Value>,
}

impl HttpResponse {
    pub fn new(status: u16, json: Option<Value>) -> Self {
        Self { status, json }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Extracts the human-readable error from an error body.
    ///
    /// Understands both OAuth (`error_description` / `error`) and Google
    /// API (`error.message`) shapes.
    pub fn error_message(&self) -> Option<String> {
        let json = self.json.as_ref()?;
        if let Some(message) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return Some(message.to_string());
        }
        json.get("error_description")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Like [`error_message`](Self::error_message), falling back to the status.
    pub fn describe_error(&self) -> String {
        self.error_message()
            .unwrap_or_else(|| format!("request failed with status {}", self.status))
    }
}

/// Sends HTTP requests.
///
/// Implementations return `Err` only when no response was obtained
/// (connection failure, timeout). Any HTTP status, including errors, is an
/// `Ok` response.
pub trait HttpTransport: Send + Sync {
    fn request(&self, request: HttpRequest) -> BoxFuture<'_, ProviderResult<HttpResponse>>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("calsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn request(&self, request: HttpRequest) -> BoxFuture<'_, ProviderResult<HttpResponse>> {
        Box::pin(async move {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder = match &request.body {
                Some(RequestBody::Json(value)) => builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(value.to_string()),
                Some(RequestBody::Form(params)) => builder.form(params),
                None => builder,
            };

            let response = builder.send().await.map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                ProviderError::transport(format!(
                    "{} {}: {}",
                    request.method.as_str(),
                    request.url,
                    reason
                ))
                .with_source(e)
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                ProviderError::transport(format!("failed to read response body: {}", e))
                    .with_source(e)
            })?;

            let json = if body.trim().is_empty() {
                None
            } else {
                match serde_json::from_str(&body) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!(status, error = %e, "response body is not JSON");
                        None
                    }
                }
            };

            debug!(method = request.method.as_str(), url = %request.url, status, "http request completed");
            Ok(HttpResponse::new(status, json))
        })
    }
}
