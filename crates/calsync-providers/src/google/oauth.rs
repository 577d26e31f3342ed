//! OAuth 2.0 authorization code flow with PKCE.
//!
//! Only the pieces that do not need a browser live here: verifier and
//! challenge generation, the consent URL, parsing the redirect the user
//! lands on, and decoding token endpoint responses. Driving the browser is
//! the caller's job.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::transport::HttpResponse;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Seconds shaved off `expires_in` so a token is treated as expired
/// slightly before the provider does.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// PKCE verifier, challenge and CSRF state for one authorization attempt.
///
/// Implements RFC 7636.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    pub verifier: String,
    /// SHA-256 of the verifier, base64url encoded.
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the consent page URL.
    ///
    /// Requests offline access with forced consent so the provider always
    /// returns a refresh token.
    pub fn build_auth_url(
        &self,
        authorization_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            authorization_endpoint,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the authorization code from the URL the provider redirected to.
///
/// Fails when the provider reported an error, when no code is present, or
/// when `expected_state` is given and does not match.
pub fn parse_callback(redirect_url: &str, expected_state: Option<&str>) -> ProviderResult<String> {
    let url = Url::parse(redirect_url).map_err(|e| {
        ProviderError::auth_exchange(format!("invalid redirect URL: {}", e)).with_source(e)
    })?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(ProviderError::auth_exchange(format!(
            "authorization denied: {}",
            error
        )));
    }
    if let Some(expected) = expected_state
        && state.as_deref() != Some(expected)
    {
        return Err(ProviderError::auth_exchange(
            "OAuth state mismatch - possible CSRF attack",
        ));
    }
    code.ok_or_else(|| ProviderError::auth_exchange("missing authorization code in callback"))
}

/// Response from a token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Decodes a successful token endpoint response.
    pub fn from_response(response: &HttpResponse) -> ProviderResult<Self> {
        let json = response
            .json
            .clone()
            .ok_or_else(|| ProviderError::invalid_response("token response has no JSON body"))?;
        serde_json::from_value(json).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_source(e)
        })
    }

    /// Returns when the access token should be treated as expired.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|secs| now + Duration::seconds(secs) - Duration::seconds(EXPIRY_BUFFER_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // 32 bytes base64url without padding
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            PkceFlow::compute_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pkce_flows_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            AUTH_URL,
            "test-client.apps.googleusercontent.com",
            "http://127.0.0.1:8080/callback",
            &["https://www.googleapis.com/auth/calendar".to_string()],
        );

        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("client_id=test-client.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains(&format!("code_challenge={}", flow.challenge)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn callback_returns_code() {
        let code = parse_callback(
            "http://127.0.0.1:8080/callback?code=4%2F0Ab&state=xyz",
            Some("xyz"),
        )
        .unwrap();
        assert_eq!(code, "4/0Ab");
    }

    #[test]
    fn callback_state_mismatch() {
        let err =
            parse_callback("http://127.0.0.1:8080/callback?code=c&state=evil", Some("xyz"))
                .unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::AuthExchangeFailed);
        assert!(err.message().contains("state mismatch"));
    }

    #[test]
    fn callback_reports_denial() {
        let err = parse_callback("http://127.0.0.1:8080/callback?error=access_denied", None)
            .unwrap_err();
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn token_response_decoding() {
        let response = HttpResponse::new(
            200,
            Some(json!({
                "access_token": "ya29.a0",
                "expires_in": 3599,
                "token_type": "Bearer",
                "scope": "https://www.googleapis.com/auth/calendar"
            })),
        );
        let token = TokenResponse::from_response(&response).unwrap();
        assert_eq!(token.access_token, "ya29.a0");
        assert!(token.refresh_token.is_none());

        let now = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        assert_eq!(
            token.expires_at(now),
            Some(now + Duration::seconds(3599 - 60))
        );
    }

    #[test]
    fn token_response_without_access_token_is_invalid() {
        let response = HttpResponse::new(200, Some(json!({"token_type": "Bearer"})));
        let err = TokenResponse::from_response(&response).unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::InvalidResponse);

        let empty = HttpResponse::new(200, None);
        assert!(TokenResponse::from_response(&empty).is_err());
    }
}
