//! OAuth 2.0 Client Credentials token source.
//!
//! Each tenant gets its own [`TokenSource`]: its own HTTP client, its own
//! credentials and its own cached token. Nothing is shared between tenants,
//! so a rejected credential for one customer never affects another.
//!
//! # Features
//!
//! - Lazy acquisition on first use
//! - Cached until `refresh_threshold` before expiry
//! - Concurrent callers for the same tenant share a single acquisition
//! - Rejected credentials (400/401) are classified apart from transport and
//!   5xx failures, which callers may retry
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_manager::{TokenSource, TokenSourceConfig};
//! use common::secret::SecretString;
//!
//! let config = TokenSourceConfig::new(
//!     "https://login.example.com/tenant-1/oauth2/v2.0/token".to_string(),
//!     "client-id".to_string(),
//!     SecretString::from("secret"),
//! );
//! let source = TokenSource::new(config)?;
//!
//! let token = source.token().await?;
//! let header = format!("Bearer {}", token.expose_secret());
//! ```
//!
//! # Security
//!
//! - Client secret and tokens are stored as `SecretString` (never logged)
//! - Error response bodies are logged at trace level only

use crate::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default refresh threshold (5 minutes before expiration).
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(300);

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default OAuth scope for the meeting API.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default connection timeout for HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while acquiring a tenant token.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Transport failure talking to the token endpoint.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// Token endpoint returned a server error or throttled the request.
    #[error("Token endpoint unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected by the token endpoint (400, 401).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Token response parsing failed.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TokenError {
    /// Whether retrying the acquisition may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, TokenError::HttpError(_) | TokenError::Unavailable(_))
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a tenant token source.
#[derive(Clone)]
pub struct TokenSourceConfig {
    /// Full token endpoint URL for the tenant.
    pub token_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret (as `SecretString`).
    pub client_secret: SecretString,

    /// Requested scope.
    pub scope: String,

    /// Refresh token this long before expiration.
    pub refresh_threshold: Duration,

    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for TokenSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSourceConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("refresh_threshold", &self.refresh_threshold)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl TokenSourceConfig {
    /// Create a new configuration with default scope and timeouts.
    #[must_use]
    pub fn new(token_url: String, client_id: String, client_secret: SecretString) -> Self {
        Self {
            token_url,
            client_id,
            client_secret,
            scope: DEFAULT_SCOPE.to_string(),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the requested scope.
    #[must_use]
    pub fn with_scope(mut self, scope: String) -> Self {
        self.scope = scope;
        self
    }

    /// Set the refresh threshold.
    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

// =============================================================================
// OAuth Response Types
// =============================================================================

/// OAuth 2.0 token response.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: i64,
}

// =============================================================================
// Token Source
// =============================================================================

/// Lazily acquired, cached bearer token for one tenant.
pub struct TokenSource {
    config: TokenSourceConfig,
    http_client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Build a token source.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the token URL is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: TokenSourceConfig) -> Result<Self, TokenError> {
        if config.token_url.trim().is_empty() {
            return Err(TokenError::Configuration("Token URL is empty".into()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
            cached: Mutex::new(None),
        })
    }

    /// Returns the OAuth client ID this source authenticates as.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Get a valid token, acquiring a new one if the cached one is missing
    /// or about to expire.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error; see [`TokenError::is_transient`].
    pub async fn token(&self) -> Result<SecretString, TokenError> {
        let mut cached = self.cached.lock().await;

        let now = chrono::Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)]
        let threshold_secs = self.config.refresh_threshold.as_secs() as i64;

        if let Some(existing) = cached.as_ref() {
            if existing.expires_at - now > threshold_secs {
                return Ok(existing.token.clone());
            }
        }

        let (token, expires_at) = acquire_token(&self.config, &self.http_client).await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    /// Drop the cached token so the next call re-acquires.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// Acquire a new token from the tenant's token endpoint.
///
/// Returns the token and its expiration time (Unix timestamp).
#[instrument(skip_all, fields(client_id = %config.client_id))]
async fn acquire_token(
    config: &TokenSourceConfig,
    http_client: &reqwest::Client,
) -> Result<(SecretString, i64), TokenError> {
    debug!(
        target: "common.token_manager",
        url = %config.token_url,
        "Requesting tenant token"
    );

    let form_body = [
        ("grant_type", "client_credentials"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.expose_secret()),
        ("scope", config.scope.as_str()),
    ];

    let response = http_client
        .post(&config.token_url)
        .form(&form_body)
        .send()
        .await
        .map_err(|e| {
            debug!(target: "common.token_manager", error = %e, "HTTP request failed");
            TokenError::HttpError(e.to_string())
        })?;

    let status = response.status();

    if status.is_success() {
        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            warn!(target: "common.token_manager", error = %e, "Failed to parse token response");
            TokenError::InvalidResponse(e.to_string())
        })?;

        let now = chrono::Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)]
        let expires_at = now + token_response.expires_in as i64;

        debug!(
            target: "common.token_manager",
            expires_in_secs = token_response.expires_in,
            "Tenant token acquired"
        );

        Ok((SecretString::from(token_response.access_token), expires_at))
    } else if status.as_u16() == 401 || status.as_u16() == 400 {
        let body = response.text().await.unwrap_or_else(|e| {
            trace!(target: "common.token_manager", error = %e, "Failed to read error response body");
            "<failed to read body>".to_string()
        });
        warn!(
            target: "common.token_manager",
            status = %status,
            "Credentials rejected by token endpoint"
        );
        trace!(
            target: "common.token_manager",
            body = %body,
            "Authentication rejection response body"
        );
        Err(TokenError::AuthenticationRejected(format!(
            "Status {status}"
        )))
    } else if status.is_server_error() || status.as_u16() == 429 {
        warn!(
            target: "common.token_manager",
            status = %status,
            "Token endpoint unavailable"
        );
        Err(TokenError::Unavailable(format!("Status {status}")))
    } else {
        warn!(
            target: "common.token_manager",
            status = %status,
            "Unexpected response from token endpoint"
        );
        Err(TokenError::InvalidResponse(format!(
            "Unexpected status: {status}"
        )))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

    fn test_config(base_url: &str) -> TokenSourceConfig {
        TokenSourceConfig::new(
            format!("{base_url}{TOKEN_PATH}"),
            "test-client".to_string(),
            SecretString::from("test-secret"),
        )
    }

    fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
        serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = test_config("http://localhost:8082");

        assert_eq!(config.refresh_threshold, DEFAULT_REFRESH_THRESHOLD);
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(config.scope, DEFAULT_SCOPE);
    }

    #[test]
    fn test_config_builder() {
        let config = test_config("http://localhost:8082")
            .with_scope("api://meetings/.default".to_string())
            .with_refresh_threshold(Duration::from_secs(60))
            .with_http_timeout(Duration::from_secs(5));

        assert_eq!(config.scope, "api://meetings/.default");
        assert_eq!(config.refresh_threshold, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = TokenSourceConfig::new(
            "http://localhost:8082/token".to_string(),
            "client".to_string(),
            SecretString::from("super-secret-value"),
        );

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-value"));
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let config = TokenSourceConfig::new(
            "  ".to_string(),
            "client".to_string(),
            SecretString::from("secret"),
        );
        assert!(matches!(
            TokenSource::new(config),
            Err(TokenError::Configuration(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(TokenError::HttpError("reset".into()).is_transient());
        assert!(TokenError::Unavailable("503".into()).is_transient());
        assert!(!TokenError::AuthenticationRejected("401".into()).is_transient());
        assert!(!TokenError::InvalidResponse("bad".into()).is_transient());
        assert!(!TokenError::Configuration("bad".into()).is_transient());
    }

    #[tokio::test]
    async fn test_token_acquired_with_client_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=test-client"))
            .and(body_string_contains("client_secret=test-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tenant-token", 3600)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        let token = source.token().await.unwrap();

        assert_eq!(token.expose_secret(), "tenant-token");
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("cached", 3600)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        for _ in 0..5 {
            assert_eq!(source.token().await.unwrap().expose_secret(), "cached");
        }
    }

    #[tokio::test]
    async fn test_short_lived_token_is_reacquired() {
        let mock_server = MockServer::start().await;

        // Expires inside the refresh threshold, so every call re-acquires
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 10)))
            .expect(2)
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        source.token().await.unwrap();
        source.token().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_forces_reacquire() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 3600)))
            .expect(2)
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        source.token().await.unwrap();
        source.invalidate().await;
        source.token().await.unwrap();
    }

    #[tokio::test]
    async fn test_401_is_authentication_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        let err = source.token().await.unwrap_err();

        assert!(matches!(err, TokenError::AuthenticationRejected(_)));
        assert!(!err.is_transient());
        // Body is never included in the error message
        assert!(!err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn test_500_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        let err = source.token().await.unwrap_err();

        assert!(matches!(err, TokenError::Unavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let source = TokenSource::new(test_config(&mock_server.uri())).unwrap();
        let err = source.token().await.unwrap_err();

        assert!(matches!(err, TokenError::InvalidResponse(_)));
    }
}
