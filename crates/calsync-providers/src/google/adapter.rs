//! Google Calendar sync adapter.
//!
//! Lists, creates, replaces and deletes events through the Calendar API v3,
//! translating between canonical events and Google's event resources.

use std::sync::Arc;

use calsync_core::{Event, PRIMARY_CALENDAR, SyncSettings};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::tokens::TokenManager;
use super::translate::{GoogleTranslator, WireEvent};
use crate::auth::AuthorizedTransport;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, FormatTranslator, SyncAdapter};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Largest page the events endpoint accepts.
const MAX_PAGE_SIZE: usize = 2500;

/// One page of `events.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EventPage {
    items: Vec<WireEvent>,
    next_page_token: Option<String>,
}

/// Sync adapter for Google Calendar.
pub struct GoogleCalendarAdapter {
    http: AuthorizedTransport,
    translator: GoogleTranslator,
    api_base: String,
    default_calendar: String,
}

impl GoogleCalendarAdapter {
    /// Creates an adapter against the public Calendar API.
    pub fn new(tokens: Arc<TokenManager>, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_settings(tokens, transport, &SyncSettings::default())
    }

    /// Creates an adapter using the API base and default calendar from
    /// `settings`.
    pub fn with_settings(
        tokens: Arc<TokenManager>,
        transport: Arc<dyn HttpTransport>,
        settings: &SyncSettings,
    ) -> Self {
        let translator = GoogleTranslator::new(tokens.provider());
        let default_calendar = if settings.calendar_id.trim().is_empty() {
            PRIMARY_CALENDAR.to_string()
        } else {
            settings.calendar_id.clone()
        };
        Self {
            http: AuthorizedTransport::new(transport, tokens),
            translator,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            default_calendar,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        self.http.tokens()
    }

    /// Probes the API with the current token. Never refreshes.
    pub async fn test_connection(&self) -> bool {
        self.tokens().test_connection().await
    }

    fn events_url(&self, calendar_id: Option<&str>) -> String {
        let calendar = calendar_id.unwrap_or(&self.default_calendar);
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar)
        )
    }

    fn event_url(&self, calendar_id: Option<&str>, external_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(external_id)
        )
    }

    /// Sends an authorized request and maps non-2xx answers to errors.
    async fn execute(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        let response = self.http.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        Err(
            ProviderError::provider_request(response.status, response.describe_error())
                .with_provider(self.translator.provider()),
        )
    }

    async fn fetch_page(
        &self,
        calendar_id: Option<&str>,
        window_start: DateTime<Utc>,
        page_size: usize,
        page_token: Option<&str>,
    ) -> ProviderResult<EventPage> {
        let mut url = Url::parse(&self.events_url(calendar_id)).map_err(|e| {
            ProviderError::configuration(format!("invalid calendar API URL: {}", e))
                .with_source(e)
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(
                    "timeMin",
                    &window_start.to_rfc3339_opts(SecondsFormat::Secs, true),
                )
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime")
                .append_pair("maxResults", &page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self.execute(HttpRequest::get(url.as_str())).await?;
        let json = response
            .json
            .ok_or_else(|| self.invalid("event list response has no JSON body"))?;
        serde_json::from_value(json).map_err(|e| {
            self.invalid(format!("invalid event list response: {}", e))
                .with_source(e)
        })
    }

    /// Decodes a single event echo, keeping the caller's local id.
    fn echo(&self, response: HttpResponse, local: &Event) -> ProviderResult<Event> {
        let json = response
            .json
            .ok_or_else(|| self.invalid("event response has no JSON body"))?;
        let wire: WireEvent = serde_json::from_value(json)
            .map_err(|e| self.invalid(format!("invalid event response: {}", e)).with_source(e))?;
        Ok(self.translator.to_internal(&wire).with_id(local.id))
    }

    fn encode(&self, event: &Event, external_id: Option<&str>) -> ProviderResult<Value> {
        let issues = event.validate();
        if !issues.is_empty() {
            return Err(ProviderError::validation(issues).with_provider(self.translator.provider()));
        }
        let mut wire = self.translator.to_external(event);
        wire.id = external_id.map(str::to_string);
        serde_json::to_value(wire)
            .map_err(|e| self.invalid(format!("cannot encode event: {}", e)).with_source(e))
    }

    fn invalid(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::invalid_response(message).with_provider(self.translator.provider())
    }

    async fn list(
        &self,
        calendar_id: Option<&str>,
        window_start: DateTime<Utc>,
        limit: usize,
    ) -> ProviderResult<Vec<Event>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        while events.len() < limit {
            let page_size = (limit - events.len()).min(MAX_PAGE_SIZE);
            let page = self
                .fetch_page(calendar_id, window_start, page_size, page_token.as_deref())
                .await?;

            // timeMin filters on end time; events already running at the
            // window start are not part of the listing.
            let remaining = limit - events.len();
            events.extend(
                page.items
                    .iter()
                    .map(|wire| self.translator.to_internal(wire))
                    .filter(|event| event.start.is_none_or(|s| s.instant >= window_start))
                    .take(remaining),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            calendar = calendar_id.unwrap_or(&self.default_calendar),
            count = events.len(),
            "listed events"
        );
        Ok(events)
    }

    async fn create(&self, event: &Event, calendar_id: Option<&str>) -> ProviderResult<Event> {
        let body = self.encode(event, None)?;
        let request = HttpRequest::post(self.events_url(calendar_id)).with_json(body);
        let created = self.echo(self.execute(request).await?, event)?;
        info!(
            external_id = created.external_id().unwrap_or_default(),
            "created event"
        );
        Ok(created)
    }

    async fn update(
        &self,
        external_id: &str,
        event: &Event,
        calendar_id: Option<&str>,
    ) -> ProviderResult<Event> {
        let body = self.encode(event, Some(external_id))?;
        let request = HttpRequest::put(self.event_url(calendar_id, external_id)).with_json(body);
        let updated = self.echo(self.execute(request).await?, event)?;
        debug!(external_id, "updated event");
        Ok(updated)
    }

    async fn delete(&self, external_id: &str, calendar_id: Option<&str>) -> ProviderResult<()> {
        self.execute(HttpRequest::delete(self.event_url(calendar_id, external_id)))
            .await?;
        info!(external_id, "deleted event");
        Ok(())
    }
}

impl SyncAdapter for GoogleCalendarAdapter {
    fn name(&self) -> &str {
        self.translator.provider()
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: Option<&'a str>,
        window_start: DateTime<Utc>,
        limit: usize,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>> {
        Box::pin(self.list(calendar_id, window_start, limit))
    }

    fn create_event<'a>(
        &'a self,
        event: &'a Event,
        calendar_id: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(self.create(event, calendar_id))
    }

    fn update_event<'a>(
        &'a self,
        external_id: &'a str,
        event: &'a Event,
        calendar_id: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<Event>> {
        Box::pin(self.update(external_id, event, calendar_id))
    }

    fn delete_event<'a>(
        &'a self,
        external_id: &'a str,
        calendar_id: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.delete(external_id, calendar_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorCode;
    use crate::google::{ConnectionConfig, ConnectionState};
    use crate::provider::KnownEvent;
    use crate::testing::*;
    use crate::transport::Method;
    use calsync_core::{ValidationIssue, ZonedTime};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use tokio::sync::Notify;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    fn standup() -> Event {
        Event::timed(
            "Standup",
            ZonedTime::utc(at(9)),
            ZonedTime::utc(at(9) + Duration::minutes(15)),
        )
    }

    fn wire(id: &str, hour: u32) -> Value {
        json!({
            "id": id,
            "summary": format!("Event {}", id),
            "start": {"dateTime": at(hour).to_rfc3339(), "timeZone": "UTC"},
            "end": {"dateTime": (at(hour) + Duration::minutes(30)).to_rfc3339(), "timeZone": "UTC"},
            "status": "confirmed"
        })
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            api_base: format!("{}/", API_BASE),
            ..SyncSettings::default()
        }
    }

    /// Builds an adapter whose connection holds access token `a1` and
    /// refresh token `r1`.
    fn adapter(transport: MockTransport) -> (Arc<MockTransport>, GoogleCalendarAdapter) {
        let transport = Arc::new(transport);
        let tokens = Arc::new(TokenManager::new(test_endpoints(), transport.clone()));
        tokens
            .connect(
                ConnectionConfig::new("google")
                    .with_credentials("client-id", "client-secret")
                    .with_tokens(Some("a1".to_string()), Some("r1".to_string()), None),
            )
            .unwrap();
        let adapter = GoogleCalendarAdapter::with_settings(tokens, transport.clone(), &settings());
        (transport, adapter)
    }

    /// Answers API requests only when they carry `a2`; the token endpoint
    /// always hands out `a2`.
    fn expired_token_api(
        api: impl Fn(&HttpRequest) -> ProviderResult<HttpResponse> + Send + Sync + 'static,
    ) -> MockTransport {
        MockTransport::new(move |request| {
            if request.url == TOKEN_URL {
                return reply(200, json!({"access_token": "a2", "expires_in": 3600}));
            }
            match request.bearer_token() {
                Some("a2") => api(request),
                _ => unauthorized(),
            }
        })
    }

    fn query(request: &HttpRequest) -> Vec<(String, String)> {
        Url::parse(&request.url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn query_value(request: &HttpRequest, key: &str) -> Option<String> {
        query(request)
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    mod listing {
        use super::*;

        #[tokio::test]
        async fn sends_window_and_ordering() {
            let (transport, adapter) =
                adapter(MockTransport::new(|_| reply(200, json!({"items": [wire("e1", 10)]}))));

            let events = adapter.list_events(None, at(0), 50).await.unwrap();

            assert_eq!(events.len(), 1);
            assert_eq!(events[0].external_id(), Some("e1"));
            assert_eq!(events[0].provider(), Some("google"));

            let sent = transport.api_requests();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].method, Method::Get);
            assert!(
                sent[0]
                    .url
                    .starts_with("https://api.test/calendar/v3/calendars/primary/events?")
            );
            assert_eq!(sent[0].bearer_token(), Some("a1"));
            assert_eq!(
                query_value(&sent[0], "timeMin").as_deref(),
                Some("2024-01-02T00:00:00Z")
            );
            assert_eq!(query_value(&sent[0], "singleEvents").as_deref(), Some("true"));
            assert_eq!(query_value(&sent[0], "orderBy").as_deref(), Some("startTime"));
            assert_eq!(query_value(&sent[0], "maxResults").as_deref(), Some("50"));
            assert_eq!(query_value(&sent[0], "pageToken"), None);
        }

        #[tokio::test]
        async fn events_in_progress_are_excluded() {
            let (_, adapter) = adapter(MockTransport::new(|_| {
                let mut running = wire("running", 8);
                running["end"]["dateTime"] = json!(at(10).to_rfc3339());
                reply(200, json!({"items": [running, wire("e1", 9), wire("e2", 11)]}))
            }));

            let events = adapter.list_events(None, at(9), 2).await.unwrap();

            let ids: Vec<_> = events.iter().filter_map(Event::external_id).collect();
            assert_eq!(ids, vec!["e1", "e2"]);
        }

        #[tokio::test]
        async fn calendar_id_is_encoded() {
            let (transport, adapter) =
                adapter(MockTransport::new(|_| reply(200, json!({"items": []}))));

            adapter
                .list_events(Some("team@group.calendar.google.com"), at(0), 10)
                .await
                .unwrap();

            let sent = transport.api_requests();
            assert!(sent[0].url.contains("/calendars/team%40group.calendar.google.com/events"));
        }

        #[tokio::test]
        async fn follows_pages_until_limit() {
            let (transport, adapter) = adapter(MockTransport::new(|request| {
                match query_value(request, "pageToken").as_deref() {
                    None => reply(
                        200,
                        json!({"items": [wire("e1", 1), wire("e2", 2)], "nextPageToken": "p2"}),
                    ),
                    Some("p2") => reply(
                        200,
                        json!({"items": [wire("e3", 3), wire("e4", 4)], "nextPageToken": "p3"}),
                    ),
                    Some(other) => panic!("unexpected page {}", other),
                }
            }));

            let events = adapter.list_events(None, at(0), 3).await.unwrap();

            let ids: Vec<_> = events.iter().filter_map(Event::external_id).collect();
            assert_eq!(ids, vec!["e1", "e2", "e3"]);
            let sent = transport.api_requests();
            assert_eq!(sent.len(), 2);
            assert_eq!(query_value(&sent[0], "maxResults").as_deref(), Some("3"));
            assert_eq!(query_value(&sent[1], "maxResults").as_deref(), Some("1"));
        }

        #[tokio::test]
        async fn stops_without_next_page() {
            let (transport, adapter) =
                adapter(MockTransport::new(|_| reply(200, json!({"items": [wire("e1", 1)]}))));

            let events = adapter.list_events(None, at(0), 100).await.unwrap();

            assert_eq!(events.len(), 1);
            assert_eq!(transport.api_requests().len(), 1);
        }

        #[tokio::test]
        async fn page_size_is_capped() {
            let (transport, adapter) =
                adapter(MockTransport::new(|_| reply(200, json!({}))));

            let events = adapter.list_events(None, at(0), 10_000).await.unwrap();

            assert!(events.is_empty());
            let sent = transport.api_requests();
            assert_eq!(query_value(&sent[0], "maxResults").as_deref(), Some("2500"));
        }

        #[tokio::test]
        async fn zero_limit_makes_no_request() {
            let (transport, adapter) =
                adapter(MockTransport::new(|r| panic!("unexpected request to {}", r.url)));

            let events = adapter.list_events(None, at(0), 0).await.unwrap();

            assert!(events.is_empty());
            assert!(transport.requests().is_empty());
        }

        #[tokio::test]
        async fn non_json_body_is_invalid() {
            let (_, adapter) = adapter(MockTransport::new(|_| empty(200)));

            let err = adapter.list_events(None, at(0), 10).await.unwrap_err();

            assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
        }
    }

    mod writes {
        use super::*;

        #[tokio::test]
        async fn create_posts_and_keeps_local_id() {
            let (transport, adapter) = adapter(MockTransport::new(|request| {
                let mut echo = match &request.body {
                    Some(crate::transport::RequestBody::Json(body)) => body.clone(),
                    other => panic!("unexpected body {:?}", other),
                };
                echo["id"] = json!("created-1");
                reply(200, echo)
            }));
            let event = standup();

            let created = adapter.create_event(&event, None).await.unwrap();

            assert_eq!(created.id, event.id);
            assert_eq!(created.external_id(), Some("created-1"));
            assert_eq!(created.title, "Standup");
            assert_eq!(created.start, event.start);

            let sent = transport.api_requests();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].method, Method::Post);
            assert_eq!(sent[0].url, "https://api.test/calendar/v3/calendars/primary/events");
        }

        #[tokio::test]
        async fn create_omits_stale_external_id() {
            let (transport, adapter) =
                adapter(MockTransport::new(|_| reply(200, wire("fresh", 9))));
            let event = standup().with_external("google", "old");

            adapter.create_event(&event, None).await.unwrap();

            let sent = transport.api_requests();
            match &sent[0].body {
                Some(crate::transport::RequestBody::Json(body)) => assert!(body.get("id").is_none()),
                other => panic!("unexpected body {:?}", other),
            }
        }

        #[tokio::test]
        async fn update_puts_to_event_url() {
            let (transport, adapter) = adapter(MockTransport::new(|_| reply(200, wire("e/1", 9))));
            let event = standup().with_external("google", "e/1");

            let updated = adapter.update_event("e/1", &event, Some("work")).await.unwrap();

            assert_eq!(updated.id, event.id);
            assert_eq!(updated.external_id(), Some("e/1"));
            let sent = transport.api_requests();
            assert_eq!(sent[0].method, Method::Put);
            assert_eq!(
                sent[0].url,
                "https://api.test/calendar/v3/calendars/work/events/e%2F1"
            );
            match &sent[0].body {
                Some(crate::transport::RequestBody::Json(body)) => assert_eq!(body["id"], "e/1"),
                other => panic!("unexpected body {:?}", other),
            }
        }

        #[tokio::test]
        async fn delete_accepts_no_content() {
            let (transport, adapter) = adapter(MockTransport::new(|_| empty(204)));

            adapter.delete_event("e1", None).await.unwrap();

            let sent = transport.api_requests();
            assert_eq!(sent[0].method, Method::Delete);
            assert_eq!(sent[0].url, "https://api.test/calendar/v3/calendars/primary/events/e1");
        }

        #[tokio::test]
        async fn invalid_event_fails_before_network() {
            let (transport, adapter) =
                adapter(MockTransport::new(|r| panic!("unexpected request to {}", r.url)));
            let mut event = standup();
            event.title = " ".to_string();
            event.end = event.start;

            let err = adapter.create_event(&event, None).await.unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::ValidationFailed);
            assert_eq!(
                err.issues(),
                &[ValidationIssue::TitleRequired, ValidationIssue::EndNotAfterStart]
            );

            let err = adapter.update_event("e1", &event, None).await.unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::ValidationFailed);
            assert!(transport.requests().is_empty());
        }

        #[tokio::test]
        async fn forbidden_is_not_retried() {
            let (transport, adapter) = adapter(MockTransport::new(|_| {
                reply(
                    403,
                    json!({"error": {"code": 403, "message": "The caller does not have permission"}}),
                )
            }));

            let err = adapter.create_event(&standup(), None).await.unwrap_err();

            assert_eq!(err.code(), ProviderErrorCode::ProviderRequest);
            assert_eq!(err.status(), Some(403));
            assert_eq!(err.message(), "The caller does not have permission");
            assert_eq!(err.provider(), Some("google"));
            assert!(!err.is_retryable());
            assert!(transport.token_requests().is_empty());
            assert_eq!(transport.api_requests().len(), 1);
        }

        #[tokio::test]
        async fn transport_error_is_not_refreshed() {
            let (transport, adapter) = adapter(MockTransport::new(|_| {
                Err(ProviderError::transport("connection refused"))
            }));

            let err = adapter.delete_event("e1", None).await.unwrap_err();

            assert_eq!(err.code(), ProviderErrorCode::TransportError);
            assert!(transport.token_requests().is_empty());
        }
    }

    mod auth {
        use super::*;

        #[tokio::test]
        async fn unauthorized_refreshes_once_and_retries() {
            let (transport, adapter) =
                adapter(expired_token_api(|_| reply(200, json!({"items": [wire("e1", 9)]}))));

            let events = adapter.list_events(None, at(0), 10).await.unwrap();

            assert_eq!(events.len(), 1);
            assert_eq!(adapter.tokens().state(), ConnectionState::Authenticated);
            assert_eq!(adapter.tokens().bearer().unwrap().access_token, "a2");
            assert_eq!(transport.token_requests().len(), 1);
            let sent = transport.api_requests();
            assert_eq!(sent.len(), 2);
            assert_eq!(sent[0].bearer_token(), Some("a1"));
            assert_eq!(sent[1].bearer_token(), Some("a2"));
        }

        #[tokio::test]
        async fn rejected_refresh_requires_reauth() {
            let (transport, adapter) = adapter(MockTransport::new(|request| {
                if request.url == TOKEN_URL {
                    reply(400, json!({"error": "invalid_grant"}))
                } else {
                    unauthorized()
                }
            }));

            let err = adapter.delete_event("e1", None).await.unwrap_err();

            assert_eq!(err.code(), ProviderErrorCode::RefreshRejected);
            assert!(err.requires_reauth());
            assert_eq!(adapter.tokens().state(), ConnectionState::Unauthenticated);
            assert_eq!(transport.api_requests().len(), 1);
        }

        #[tokio::test]
        async fn second_unauthorized_fails() {
            let (transport, adapter) = adapter(MockTransport::new(|request| {
                if request.url == TOKEN_URL {
                    reply(200, json!({"access_token": "a2", "expires_in": 3600}))
                } else {
                    unauthorized()
                }
            }));

            let err = adapter.list_events(None, at(0), 10).await.unwrap_err();

            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
            assert_eq!(err.status(), Some(401));
            assert_eq!(transport.token_requests().len(), 1);
            assert_eq!(transport.api_requests().len(), 2);
        }

        #[tokio::test]
        async fn concurrent_operations_share_one_refresh() {
            let gate = Arc::new(Notify::new());
            let (transport, adapter) = adapter(
                expired_token_api(|request| match request.method {
                    Method::Delete => empty(204),
                    _ => reply(200, json!({"items": [wire("e1", 9)]})),
                })
                .with_token_gate(gate.clone()),
            );

            let release = async {
                tokio::task::yield_now().await;
                let state = adapter.tokens().state();
                gate.notify_one();
                state
            };
            let (listed, deleted, during_refresh) = tokio::join!(
                adapter.list_events(None, at(0), 10),
                adapter.delete_event("e1", None),
                release
            );

            assert_eq!(listed.unwrap().len(), 1);
            deleted.unwrap();
            assert_eq!(during_refresh, ConnectionState::Authenticating);
            assert_eq!(transport.token_requests().len(), 1);
            assert_eq!(transport.api_requests().len(), 4);
            assert_eq!(adapter.tokens().state(), ConnectionState::Authenticated);
        }

        #[tokio::test]
        async fn probe_uses_current_token() {
            let (transport, adapter) = adapter(MockTransport::new(|request| {
                assert_eq!(request.url, PROBE_URL);
                reply(200, json!({"items": []}))
            }));

            assert!(adapter.test_connection().await);
            assert_eq!(transport.requests()[0].bearer_token(), Some("a1"));
        }
    }

    mod pull {
        use super::*;

        #[tokio::test]
        async fn reports_vanished_mirrors() {
            let (_, adapter) = adapter(MockTransport::new(|_| {
                reply(200, json!({"items": [wire("e1", 9), wire("e3", 11)]}))
            }));
            let known = vec![
                KnownEvent::new("e1", at(9)),
                KnownEvent::new("e2", at(10)),
                KnownEvent::new("old", at(0) - Duration::days(3)),
            ];

            let pulled = adapter.pull(None, at(0), 10, &known).await.unwrap();

            assert_eq!(pulled.events.len(), 2);
            assert_eq!(pulled.missing, vec!["e2".to_string()]);
            assert_eq!(
                pulled.events[0].id,
                Event::mirror_id(adapter.name(), "e1")
            );
        }

        #[tokio::test]
        async fn truncated_pull_ignores_later_mirrors() {
            let (_, adapter) = adapter(MockTransport::new(|_| {
                reply(
                    200,
                    json!({"items": [wire("e1", 9), wire("e2", 10)], "nextPageToken": "more"}),
                )
            }));
            let known = vec![
                KnownEvent::new("gone", at(8)),
                KnownEvent::new("later", at(15)),
            ];

            let pulled = adapter.pull(None, at(0), 2, &known).await.unwrap();

            assert_eq!(pulled.missing, vec!["gone".to_string()]);
        }
    }
}
