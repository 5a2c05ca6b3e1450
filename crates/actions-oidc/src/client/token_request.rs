//! Identity token requests.
//!
//! A job with `id-token: write` permission gets two environment variables: the
//! URL of the token service and a bearer token for calling it. The returned
//! identity token is what a relying party later verifies with
//! [`TokenVerifier`](crate::auth::TokenVerifier).
//!
//! # Security
//!
//! - The request token and the returned identity token are held as `SecretString`
//! - Neither value is logged

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Environment variable holding the token service URL.
pub const REQUEST_URL_VAR: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";

/// Environment variable holding the bearer token for the token service.
pub const REQUEST_TOKEN_VAR: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from requesting an identity token.
#[derive(Debug, Error)]
pub enum TokenRequestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport failure or timeout.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// Token service answered with a non-success status.
    #[error("Token request rejected: {0}")]
    Rejected(String),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Where and how to ask for an identity token.
#[derive(Clone)]
pub struct TokenRequestConfig {
    pub request_url: String,

    pub request_token: SecretString,

    pub http_timeout: Duration,
}

impl std::fmt::Debug for TokenRequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequestConfig")
            .field("request_url", &self.request_url)
            .field("request_token", &"[REDACTED]")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl TokenRequestConfig {
    pub fn new(request_url: impl Into<String>, request_token: SecretString) -> Self {
        Self {
            request_url: request_url.into(),
            request_token,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Load from the job's environment.
    pub fn from_env() -> Result<Self, TokenRequestError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, TokenRequestError> {
        let request_url = vars
            .get(REQUEST_URL_VAR)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                TokenRequestError::Configuration(format!(
                    "{} is not set; the job needs `id-token: write` permission",
                    REQUEST_URL_VAR
                ))
            })?
            .clone();

        let request_token = vars
            .get(REQUEST_TOKEN_VAR)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                TokenRequestError::Configuration(format!("{} is not set", REQUEST_TOKEN_VAR))
            })?
            .clone();

        Ok(Self::new(request_url, SecretString::from(request_token)))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    value: String,
}

/// Requests identity tokens from the GitHub Actions token service.
#[derive(Debug, Clone)]
pub struct ActionsTokenClient {
    config: TokenRequestConfig,
    http_client: reqwest::Client,
}

impl ActionsTokenClient {
    pub fn new(config: TokenRequestConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "oidc.client", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            config,
            http_client,
        }
    }

    /// Build the token request without sending it.
    ///
    /// An empty `audience` leaves the query string untouched; the service then
    /// uses its default audience.
    pub fn build_request(&self, audience: &str) -> Result<reqwest::Request, TokenRequestError> {
        let mut request = self
            .http_client
            .get(&self.config.request_url)
            .bearer_auth(self.config.request_token.expose_secret())
            .build()
            .map_err(|e| TokenRequestError::Configuration(format!("invalid request URL: {}", e)))?;

        if !audience.is_empty() {
            set_query_param(request.url_mut(), "audience", audience);
        }

        Ok(request)
    }

    /// Request an identity token for `audience`.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, or response without a
    /// token value is an error. Nothing is retried.
    #[instrument(skip_all)]
    pub async fn request_token(&self, audience: &str) -> Result<SecretString, TokenRequestError> {
        let request = self.build_request(audience)?;

        tracing::debug!(target: "oidc.client", audience = %audience, "Requesting identity token");

        let response = self.http_client.execute(request).await.map_err(|e| {
            tracing::debug!(target: "oidc.client", error = %e, "HTTP request failed");
            TokenRequestError::HttpError(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "oidc.client", status = %status, "Token service rejected request");
            return Err(TokenRequestError::Rejected(status.to_string()));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            tracing::warn!(target: "oidc.client", error = %e, "Failed to parse token response");
            TokenRequestError::InvalidResponse(e.to_string())
        })?;

        if token_response.value.is_empty() {
            return Err(TokenRequestError::InvalidResponse(
                "response carried no token value".to_string(),
            ));
        }

        tracing::debug!(target: "oidc.client", "Identity token acquired");
        Ok(SecretString::from(token_response.value))
    }
}

/// Replace every `key` pair in the query with a single `key=value`.
fn set_query_param(url: &mut reqwest::Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(&kept)
        .append_pair(key, value);
}
