//! Key resolution for token verification.
//!
//! `JwksClient` fetches the JSON Web Key Sets published by one or more
//! issuer endpoints and keeps one immutable `KeySet` snapshot per endpoint.
//! A refresh builds a new snapshot and swaps it in atomically, so concurrent
//! lookups always see either the old or the new set, never a mix.
//!
//! # Refresh policy
//!
//! - Lookups never touch the network while the key is cached
//! - A missing `kid` is treated as a possible key rotation: one refresh, then re-check
//! - Refreshes triggered by a missing `kid` are rate limited by a cooldown
//! - A failed or timed-out endpoint keeps its previous snapshot
//! - Refresh errors reach explicit `refresh()` callers only

use crate::config::{
    VerificationOptions, DEFAULT_UNKNOWN_KID_REFRESH_INTERVAL, GITHUB_ACTIONS_JWKS_URL,
};
use crate::observability::metrics::record_jwks_refresh;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

/// JSON Web Key from a JWKS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Curve name for EC and OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// Algorithm the key is meant for, e.g. "RS256".
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Immutable snapshot of the keys published by one endpoint.
#[derive(Debug, Clone)]
pub struct KeySet {
    source: String,
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

impl KeySet {
    /// Build a snapshot, skipping keys without a `kid` or not meant for signatures.
    pub fn from_jwks(source: impl Into<String>, jwks: JwksResponse) -> Self {
        let source = source.into();
        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter(|key| key.key_use.as_deref().map_or(true, |key_use| key_use == "sig"))
            .filter_map(|key| {
                let kid = key.kid.clone().filter(|kid| !kid.is_empty())?;
                Some((kid, key))
            })
            .collect();

        Self {
            source,
            keys,
            fetched_at: Instant::now(),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Endpoint this snapshot was fetched from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

/// Errors from key resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key fetch failed: {0}")]
    KeyFetch(String),
}

/// Supplies public key material for a key ID.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, kid: &str) -> Result<Jwk, ResolveError>;
}

/// Resolver over a fixed, already-fetched key set. Never refreshes.
#[derive(Debug, Clone)]
pub struct StaticKeyResolver {
    keys: KeySet,
}

impl StaticKeyResolver {
    pub fn new(jwks: JwksResponse) -> Self {
        Self {
            keys: KeySet::from_jwks("static", jwks),
        }
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, kid: &str) -> Result<Jwk, ResolveError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| ResolveError::KeyNotFound(kid.to_string()))
    }
}

struct Endpoint {
    url: String,
    snapshot: ArcSwapOption<KeySet>,
}

/// JWKS client for fetching and caching public keys from issuer endpoints.
///
/// Thread-safe; share it behind an `Arc`. Construction does no I/O: keys are
/// loaded by the first lookup miss, an explicit `refresh`, or the scheduled
/// refresh task.
pub struct JwksClient {
    endpoints: Vec<Endpoint>,

    http_client: reqwest::Client,

    /// Upper bound on each endpoint fetch. Endpoints are fetched concurrently.
    fetch_timeout: Duration,

    /// Minimum time between refreshes triggered by an unknown `kid`.
    unknown_kid_refresh_interval: Duration,

    /// Serializes refreshes so concurrent misses share one fetch. Holds the
    /// start of the last refresh triggered by a miss.
    refresh_lock: Mutex<Option<Instant>>,

    /// Completed refresh attempts.
    generation: AtomicU64,
}

impl JwksClient {
    /// Create a JWKS client for the given endpoints.
    ///
    /// # Arguments
    ///
    /// * `key_endpoints` - JWKS URLs, checked in order; empty means the GitHub Actions endpoint
    /// * `fetch_timeout` - Upper bound on each endpoint fetch
    ///
    /// Refreshes on an unknown `kid` use the default cooldown; see
    /// `with_unknown_kid_refresh_interval`.
    pub fn new(key_endpoints: Vec<String>, fetch_timeout: Duration) -> Self {
        let key_endpoints = if key_endpoints.is_empty() {
            vec![GITHUB_ACTIONS_JWKS_URL.to_string()]
        } else {
            key_endpoints
        };

        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "oidc.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            endpoints: key_endpoints
                .into_iter()
                .map(|url| Endpoint {
                    url,
                    snapshot: ArcSwapOption::empty(),
                })
                .collect(),
            http_client,
            fetch_timeout,
            unknown_kid_refresh_interval: DEFAULT_UNKNOWN_KID_REFRESH_INTERVAL,
            refresh_lock: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_options(options: &VerificationOptions) -> Self {
        Self::new(options.key_endpoints.clone(), options.fetch_timeout)
            .with_unknown_kid_refresh_interval(options.unknown_kid_refresh_interval)
    }

    /// Set the cooldown between refreshes triggered by an unknown `kid`.
    ///
    /// Zero refreshes on every miss. Explicit `refresh` calls and the
    /// scheduled refresh task are never rate limited.
    pub fn with_unknown_kid_refresh_interval(mut self, interval: Duration) -> Self {
        self.unknown_kid_refresh_interval = interval;
        self
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|endpoint| endpoint.url.as_str())
    }

    /// Total number of cached keys across all endpoints.
    pub fn cached_key_count(&self) -> usize {
        self.endpoints
            .iter()
            .filter_map(|endpoint| endpoint.snapshot.load_full())
            .map(|keys| keys.len())
            .sum()
    }

    /// Number of refresh attempts completed so far.
    pub fn refresh_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn lookup(&self, kid: &str) -> Option<Jwk> {
        self.endpoints.iter().find_map(|endpoint| {
            endpoint
                .snapshot
                .load_full()
                .and_then(|keys| keys.get(kid).cloned())
        })
    }

    /// Refresh every endpoint.
    ///
    /// Endpoints are fetched concurrently. Each success replaces that
    /// endpoint's snapshot; failures leave the previous snapshot in place.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::KeyFetch` if any endpoint failed or timed out.
    /// Keys from the endpoints that did succeed are still installed.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), ResolveError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), ResolveError> {
        let fetches = self.endpoints.iter().map(|endpoint| async move {
            let result =
                match tokio::time::timeout(self.fetch_timeout, self.fetch(&endpoint.url)).await {
                    Ok(result) => result,
                    Err(_) => Err(ResolveError::KeyFetch(format!(
                        "timed out after {:?} fetching {}",
                        self.fetch_timeout, endpoint.url
                    ))),
                };
            (endpoint, result)
        });

        let mut failures = Vec::new();
        for (endpoint, result) in join_all(fetches).await {
            match result {
                Ok(keys) => {
                    tracing::info!(
                        target: "oidc.auth.jwks",
                        url = %endpoint.url,
                        key_count = keys.len(),
                        "JWKS snapshot refreshed"
                    );
                    endpoint.snapshot.store(Some(Arc::new(keys)));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "oidc.auth.jwks",
                        url = %endpoint.url,
                        error = %e,
                        "JWKS refresh failed, keeping previous snapshot"
                    );
                    failures.push(e.to_string());
                }
            }
        }

        self.generation.fetch_add(1, Ordering::AcqRel);

        if failures.is_empty() {
            record_jwks_refresh("success");
            Ok(())
        } else {
            record_jwks_refresh("error");
            Err(ResolveError::KeyFetch(failures.join("; ")))
        }
    }

    async fn fetch(&self, url: &str) -> Result<KeySet, ResolveError> {
        tracing::debug!(target: "oidc.auth.jwks", url = %url, "Fetching JWKS");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::KeyFetch(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ResolveError::KeyFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            ResolveError::KeyFetch(format!("invalid JWKS document from {}: {}", url, e))
        })?;

        Ok(KeySet::from_jwks(url, jwks))
    }
}

#[async_trait]
impl KeyResolver for JwksClient {
    /// Get a JWK by key ID, refreshing once on a miss unless the unknown-`kid`
    /// cooldown is still running.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::KeyNotFound` if the key is still unknown after
    /// the refresh, whether or not the refresh itself succeeded.
    #[instrument(skip(self), fields(kid = %kid))]
    async fn resolve(&self, kid: &str) -> Result<Jwk, ResolveError> {
        // Read before the lookup so a refresh finishing in between is not repeated.
        let seen_generation = self.generation.load(Ordering::Acquire);
        if let Some(key) = self.lookup(kid) {
            tracing::debug!(target: "oidc.auth.jwks", kid = %kid, "JWKS cache hit");
            return Ok(key);
        }

        {
            let mut last_miss_refresh = self.refresh_lock.lock().await;
            let cooling_down = last_miss_refresh
                .as_ref()
                .is_some_and(|started| started.elapsed() < self.unknown_kid_refresh_interval);

            // Skip the fetch if another caller refreshed while we waited.
            if self.generation.load(Ordering::Acquire) != seen_generation {
                tracing::debug!(target: "oidc.auth.jwks", kid = %kid, "JWKS refreshed while waiting");
            } else if cooling_down {
                tracing::debug!(
                    target: "oidc.auth.jwks",
                    kid = %kid,
                    cooldown = ?self.unknown_kid_refresh_interval,
                    "Key not cached, refresh on miss is cooling down"
                );
            } else {
                tracing::debug!(target: "oidc.auth.jwks", kid = %kid, "Key not cached, refreshing JWKS");
                *last_miss_refresh = Some(Instant::now());
                if let Err(e) = self.refresh_locked().await {
                    tracing::debug!(target: "oidc.auth.jwks", error = %e, "Refresh on miss was incomplete");
                }
            }
        }

        self.lookup(kid).ok_or_else(|| {
            tracing::warn!(target: "oidc.auth.jwks", kid = %kid, "Key not found in JWKS");
            ResolveError::KeyNotFound(kid.to_string())
        })
    }
}
