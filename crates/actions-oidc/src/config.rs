//! Verification options and service configuration.
//!
//! `VerificationOptions` is what the core needs to check a token.
//! `Config` wraps it with the settings of the demo server and is loaded from
//! environment variables.

use crate::auth::policy::RequiredPattern;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Key endpoint published by GitHub Actions.
pub const GITHUB_ACTIONS_JWKS_URL: &str =
    "https://token.actions.githubusercontent.com/.well-known/jwks";

/// Default timeout for fetching key documents.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval for the scheduled key refresh.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Default cooldown between key refreshes triggered by an unknown `kid`.
pub const DEFAULT_UNKNOWN_KID_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Maximum allowed clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Options consumed by the token verifier and key resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOptions {
    /// Audience that must appear in the token's `aud` claim. Empty disables the check.
    pub expected_audience: String,

    /// Ordered list of key endpoints. Never empty once built through `new`.
    pub key_endpoints: Vec<String>,

    /// Tolerance applied to `exp` and `nbf` (default: zero, at most `MAX_CLOCK_SKEW`).
    clock_skew: Duration,

    /// Upper bound on each endpoint fetch.
    pub fetch_timeout: Duration,

    /// Minimum time between refreshes triggered by an unknown `kid`.
    /// Zero refreshes on every miss.
    pub unknown_kid_refresh_interval: Duration,
}

impl VerificationOptions {
    /// Options for `expected_audience` against the GitHub Actions key endpoint.
    pub fn new(expected_audience: impl Into<String>) -> Self {
        Self {
            expected_audience: expected_audience.into(),
            key_endpoints: vec![GITHUB_ACTIONS_JWKS_URL.to_string()],
            clock_skew: Duration::ZERO,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            unknown_kid_refresh_interval: DEFAULT_UNKNOWN_KID_REFRESH_INTERVAL,
        }
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Replace the key endpoints. An empty list keeps the GitHub Actions default.
    pub fn with_key_endpoints(mut self, key_endpoints: Vec<String>) -> Self {
        if !key_endpoints.is_empty() {
            self.key_endpoints = key_endpoints;
        }
        self
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew.min(MAX_CLOCK_SKEW);
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_unknown_kid_refresh_interval(mut self, interval: Duration) -> Self {
        self.unknown_kid_refresh_interval = interval;
        self
    }
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Demo server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// Token verification options.
    pub verification: VerificationOptions,

    /// Interval for the scheduled key refresh. `None` disables it.
    pub refresh_interval: Option<Duration>,

    /// Claims every accepted token must carry.
    pub required_claims: RequiredPattern,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid JWKS refresh interval configuration: {0}")]
    InvalidRefreshInterval(String),

    #[error("Invalid required claims configuration: {0}")]
    InvalidRequiredClaims(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let expected_audience = vars.get("OIDC_AUDIENCE").cloned().unwrap_or_default();

        let key_endpoints: Vec<String> = vars
            .get("OIDC_JWKS_URLS")
            .map(|urls| {
                urls.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            Duration::ZERO
        };

        let fetch_timeout = if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidFetchTimeout(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_FETCH_TIMEOUT
        };

        // Zero disables the scheduled refresh; refresh-on-miss still applies.
        let refresh_interval = if let Some(value_str) = vars.get("JWKS_REFRESH_INTERVAL_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRefreshInterval(format!(
                    "JWKS_REFRESH_INTERVAL_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            (value > 0).then(|| Duration::from_secs(value))
        } else {
            Some(DEFAULT_REFRESH_INTERVAL)
        };

        let unknown_kid_refresh_interval =
            if let Some(value_str) = vars.get("JWKS_UNKNOWN_KID_REFRESH_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidRefreshInterval(format!(
                        "JWKS_UNKNOWN_KID_REFRESH_SECONDS must be a valid non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                Duration::from_secs(value)
            } else {
                DEFAULT_UNKNOWN_KID_REFRESH_INTERVAL
            };

        let required_claims = match vars.get("OIDC_REQUIRED_CLAIMS") {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str::<RequiredPattern>(json).map_err(|e| {
                    ConfigError::InvalidRequiredClaims(format!(
                        "OIDC_REQUIRED_CLAIMS must be a JSON object of identity claims: {}",
                        e
                    ))
                })?
            }
            _ => RequiredPattern::new(),
        };

        let verification = VerificationOptions::new(expected_audience)
            .with_key_endpoints(key_endpoints)
            .with_clock_skew(clock_skew)
            .with_fetch_timeout(fetch_timeout)
            .with_unknown_kid_refresh_interval(unknown_kid_refresh_interval);

        Ok(Config {
            bind_address,
            verification,
            refresh_interval,
            required_claims,
        })
    }
}
