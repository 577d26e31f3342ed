//! Calendar provider plumbing for calsync.
//!
//! - [`SyncAdapter`] - The remote CRUD surface every calendar backend implements
//! - [`FormatTranslator`] - Conversion between canonical events and wire records
//! - [`google::TokenManager`] - OAuth token lifecycle with single-flight refresh
//! - [`AuthorizedTransport`] - Bearer injection and the refresh-and-retry on 401
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//!        Sync orchestrator
//!               │
//!               ▼  SyncAdapter
//!   ┌───────────────────────┐     ┌──────────────────┐
//!   │ GoogleCalendarAdapter │────▶│ GoogleTranslator │
//!   └───────────┬───────────┘     └──────────────────┘
//!               ▼
//!   ┌───────────────────────┐     ┌──────────────────┐
//!   │  AuthorizedTransport  │────▶│   TokenManager   │
//!   └───────────┬───────────┘     └────────┬─────────┘
//!               │                          │
//!               └──────────┬───────────────┘
//!                          ▼
//!                   HttpTransport
//! ```

pub mod auth;
pub mod error;
pub mod google;
pub mod provider;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use auth::AuthorizedTransport;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{BoxFuture, FormatTranslator, KnownEvent, SyncAdapter, SyncPull};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ReqwestTransport,
};
