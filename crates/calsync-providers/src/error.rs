//! Error types for sync adapter operations.
//!
//! Every failure a caller can observe from the adapter, the token manager
//! or the transport is a [`ProviderError`] carrying a [`ProviderErrorCode`].
//! The code is what callers branch on; the message is for humans.

use std::fmt;

use calsync_core::ValidationIssue;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Connection setup is inconsistent or missing.
    ConfigurationError,
    /// The authorization code could not be exchanged for tokens.
    AuthExchangeFailed,
    /// A refresh was needed but no refresh token is held.
    NoRefreshToken,
    /// The token endpoint refused the refresh token.
    RefreshRejected,
    /// The provider still refused the request after a token refresh.
    AuthenticationFailed,
    /// The provider answered with a non-success status other than 401.
    ProviderRequest,
    /// The request never produced an HTTP response.
    TransportError,
    /// The provider answered with a body we could not interpret.
    InvalidResponse,
    /// The event failed local validation and was never sent.
    ValidationFailed,
}

impl ProviderErrorCode {
    /// Returns true if the same call may succeed when simply retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError)
    }

    /// Returns true if the user must go through authorization again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::NoRefreshToken | Self::RefreshRejected | Self::AuthenticationFailed
        )
    }

    /// Returns a stable machine-readable name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::AuthExchangeFailed => "auth_exchange_failed",
            Self::NoRefreshToken => "no_refresh_token",
            Self::RefreshRejected => "refresh_rejected",
            Self::AuthenticationFailed => "authentication_failed",
            Self::ProviderRequest => "provider_request",
            Self::TransportError => "transport_error",
            Self::InvalidResponse => "invalid_response",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while talking to a calendar provider.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The provider that produced this error (e.g. `"google"`).
    provider: Option<String>,
    /// HTTP status returned by the provider, when there was one.
    status: Option<u16>,
    /// Validation failures, for [`ProviderErrorCode::ValidationFailed`].
    issues: Vec<ValidationIssue>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            status: None,
            issues: Vec::new(),
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an authorization code exchange error.
    pub fn auth_exchange(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthExchangeFailed, message)
    }

    /// Creates the error returned when no refresh token is held.
    pub fn no_refresh_token() -> Self {
        Self::new(
            ProviderErrorCode::NoRefreshToken,
            "no refresh token available; re-authorization required",
        )
    }

    /// Creates a refresh rejection error.
    pub fn refresh_rejected(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RefreshRejected, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates an error for a non-success provider response.
    pub fn provider_request(status: u16, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ProviderRequest, message).with_status(status)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::TransportError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a validation error listing every violated rule.
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        let message = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let mut err = Self::new(ProviderErrorCode::ValidationFailed, message);
        err.issues = issues;
        err
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the HTTP status for this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns the HTTP status, if the provider answered.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the validation issues, empty unless validation failed.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the user must authorize again.
    pub fn requires_reauth(&self) -> bool {
        self.code.requires_reauth()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(status) = self.status {
            write!(f, " ({})", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(ProviderErrorCode::TransportError.is_retryable());
        assert!(!ProviderErrorCode::ProviderRequest.is_retryable());
        assert!(!ProviderErrorCode::RefreshRejected.is_retryable());
        assert!(!ProviderErrorCode::ValidationFailed.is_retryable());
    }

    #[test]
    fn reauth_codes() {
        assert!(ProviderErrorCode::NoRefreshToken.requires_reauth());
        assert!(ProviderErrorCode::RefreshRejected.requires_reauth());
        assert!(ProviderErrorCode::AuthenticationFailed.requires_reauth());
        assert!(!ProviderErrorCode::TransportError.requires_reauth());
        assert!(!ProviderErrorCode::ConfigurationError.requires_reauth());
    }

    #[test]
    fn provider_request_carries_status() {
        let err = ProviderError::provider_request(403, "forbidden").with_provider("google");
        assert_eq!(err.code(), ProviderErrorCode::ProviderRequest);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "[google] provider_request (403): forbidden");
    }

    #[test]
    fn validation_lists_every_issue() {
        let err = ProviderError::validation(vec![
            ValidationIssue::TitleRequired,
            ValidationIssue::StartRequired,
        ]);
        assert_eq!(err.code(), ProviderErrorCode::ValidationFailed);
        assert_eq!(err.issues().len(), 2);
        assert_eq!(err.message(), "title is required; start date is required");
    }

    #[test]
    fn display_without_provider_or_status() {
        let err = ProviderError::no_refresh_token();
        assert_eq!(
            err.to_string(),
            "no_refresh_token: no refresh token available; re-authorization required"
        );
    }

    #[test]
    fn with_source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = ProviderError::transport("request failed").with_source(io_err);
        assert!(err.source().is_some());
    }
}
