//! Sync adapter and translator traits.
//!
//! This module defines the seams every calendar backend plugs into:
//!
//! - [`FormatTranslator`]: converts canonical events to and from a provider's
//!   wire records
//! - [`SyncAdapter`]: the remote CRUD surface the sync orchestrator drives
//! - [`SyncPull`]: the result of one pull, including tombstone candidates

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use calsync_core::Event;
use chrono::{DateTime, Utc};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Keeps [`SyncAdapter`] and [`HttpTransport`](crate::transport::HttpTransport)
/// object-safe so they can be held as `dyn` trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bidirectional conversion between canonical events and wire records.
///
/// Conversion never fails: unknown or malformed wire values fall back to
/// defaults so one odd record cannot abort a whole pull.
pub trait FormatTranslator {
    type Wire;

    /// Converts a canonical event to the provider's wire shape.
    fn to_external(&self, event: &Event) -> Self::Wire;

    /// Converts a wire record to a canonical event.
    fn to_internal(&self, wire: &Self::Wire) -> Event;
}

/// What the orchestrator already mirrors locally, for tombstone detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownEvent {
    pub external_id: String,
    pub start: DateTime<Utc>,
}

impl KnownEvent {
    pub fn new(external_id: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            external_id: external_id.into(),
            start,
        }
    }

    /// Builds the entry for a local mirror. `None` for local-only events or
    /// events without a start.
    pub fn from_event(event: &Event) -> Option<Self> {
        let external_id = event.external_id()?;
        let start = event.start?;
        Some(Self::new(external_id, start.instant))
    }
}

/// The result of one pull.
#[derive(Debug, Clone, Default)]
pub struct SyncPull {
    /// Translated provider events, in provider order.
    pub events: Vec<Event>,
    /// External ids of known mirrors the provider no longer reports.
    pub missing: Vec<String>,
}

impl SyncPull {
    /// Reconciles a listing against what is mirrored locally.
    ///
    /// A known event is reported missing only if its start lies inside the
    /// window the listing actually covered. When `truncated` is set the
    /// listing stopped at its limit, and the covered window ends before the
    /// latest start among the returned events. A truncated listing with no
    /// usable start reports nothing missing.
    pub fn reconcile(
        events: Vec<Event>,
        known: &[KnownEvent],
        window_start: DateTime<Utc>,
        truncated: bool,
    ) -> Self {
        let horizon = if truncated {
            let latest = events.iter().filter_map(|e| e.start).map(|s| s.instant).max();
            if latest.is_none() {
                return Self {
                    events,
                    missing: Vec::new(),
                };
            }
            latest
        } else {
            None
        };

        let missing = {
            let seen: HashSet<&str> = events.iter().filter_map(Event::external_id).collect();
            known
                .iter()
                .filter(|k| k.start >= window_start)
                .filter(|k| horizon.is_none_or(|h| k.start < h))
                .filter(|k| !seen.contains(k.external_id.as_str()))
                .map(|k| k.external_id.clone())
                .collect()
        };

        Self { events, missing }
    }
}

/// Remote CRUD surface of a calendar provider.
///
/// `calendar_id: None` targets the account's primary calendar.
pub trait SyncAdapter: Send + Sync {
    /// Returns the provider tag stamped on mirrored events (e.g. `"google"`).
    fn name(&self) -> &str;

    /// Lists up to `limit` events starting at or after `window_start`.
    fn list_events<'a>(
        &'a self,
        calendar_id: Option<&'a str>,
        window_start: DateTime<Utc>,
        limit: usize,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>>;

    /// Creates the event remotely and returns the provider's copy.
    fn create_event<'a>(
        &'a self,
        event: &'a Event,
        calendar_id: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<Event>>;

    /// Replaces the remote record and returns the provider's copy.
    fn update_event<'a>(
        &'a self,
        external_id: &'a str,
        event: &'a Event,
        calendar_id: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<Event>>;

    /// Deletes the remote record.
    fn delete_event<'a>(
        &'a self,
        external_id: &'a str,
        calendar_id: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Lists events and reports which `known` mirrors have disappeared.
    fn pull<'a>(
        &'a self,
        calendar_id: Option<&'a str>,
        window_start: DateTime<Utc>,
        limit: usize,
        known: &'a [KnownEvent],
    ) -> BoxFuture<'a, ProviderResult<SyncPull>> {
        Box::pin(async move {
            let events = self.list_events(calendar_id, window_start, limit).await?;
            let truncated = limit > 0 && events.len() >= limit;
            Ok(SyncPull::reconcile(events, known, window_start, truncated))
        })
    }
}
