//! JWKS client for fetching and caching the tenant's RSA signing keys.
//!
//! The directory publishes its signing keys at an issuer-specific discovery
//! URI. The client holds a single cache entry: the key set most recently
//! fetched, the URI it came from and an absolute freshness deadline. A lookup
//! is served from the cache only while the entry is fresh, was fetched from
//! the URI derived for the token's issuer, and contains the requested `kid`.
//! Anything else triggers a refresh.
//!
//! # Concurrency
//!
//! - The entry is an `Arc` swapped atomically under an `RwLock`; readers keep
//!   whatever set they cloned and never see a half-built map.
//! - Refreshes are single-flight: concurrent misses queue on a mutex, and a
//!   waiter whose miss was answered by a refresh that completed while it
//!   waited shares that outcome, success or failure, instead of fetching
//!   again. Waiting for the mutex is bounded by the fetch timeout, so no
//!   caller waits on more than one fetch during a directory outage.
//! - Dropping a caller mid-fetch releases the lock without touching the
//!   cache.

use crate::auth::signature::EXPECTED_ALGORITHM;
use crate::auth::tenant::TenantConfig;
use crate::errors::AuthError;
use crate::observability::metrics::{record_jwks_cache_lookup, record_jwks_fetch};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Upper bound on the cache TTL.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

/// Default timeout for a single JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON Web Key as published at the discovery endpoint.
///
/// Only the RSA fields are modelled; other members (`x5c`, `x5t`, `issuer`)
/// are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (`"RSA"` for usable keys).
    #[serde(default)]
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url, big-endian).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url, big-endian).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is intended for. Keys pinned to anything other
    /// than `RS256` are skipped.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (`"sig"` for signing keys).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Decoded RSA public key components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub kid: String,

    /// Modulus, big-endian, without leading zero bytes.
    pub n: Vec<u8>,

    /// Public exponent, big-endian.
    pub e: Vec<u8>,
}

impl RsaPublicKey {
    /// Decode a JWK into RSA components.
    ///
    /// Returns `None` for keys that cannot verify RS256 signatures: missing
    /// `kid`, non-RSA key types, keys restricted to another use or another
    /// algorithm, and keys whose components are missing or not valid
    /// base64url.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let kid = jwk.kid.as_deref().filter(|kid| !kid.is_empty())?;
        if jwk.kty != "RSA" {
            return None;
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            return None;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != EXPECTED_ALGORITHM) {
            return None;
        }

        let n = URL_SAFE_NO_PAD.decode(jwk.n.as_deref()?).ok()?;
        let e = URL_SAFE_NO_PAD.decode(jwk.e.as_deref()?).ok()?;

        let first_nonzero = n.iter().position(|b| *b != 0)?;
        let n = n.get(first_nonzero..)?.to_vec();
        if e.is_empty() {
            return None;
        }

        Some(Self {
            kid: kid.to_string(),
            n,
            e,
        })
    }
}

/// The single cached key set.
#[derive(Debug)]
struct CachedJwks {
    keys: HashMap<String, Arc<RsaPublicKey>>,

    /// URI the set was fetched from.
    uri: String,

    expires_at: Instant,
}

impl CachedJwks {
    fn is_fresh_for(&self, uri: &str, now: Instant) -> bool {
        self.uri == uri && now < self.expires_at
    }
}

/// Outcome of the most recent completed refresh attempt.
#[derive(Debug, Default)]
struct LastRefresh {
    uri: String,
    succeeded: bool,
}

/// JWKS client for fetching and caching public keys.
///
/// Thread-safe; share it behind an `Arc`.
pub struct JwksClient {
    tenant: TenantConfig,

    http_client: reqwest::Client,

    cache: RwLock<Option<Arc<CachedJwks>>>,

    /// Serialises refreshes and records how the last one ended.
    refresh_lock: Mutex<LastRefresh>,

    /// Completed refresh attempts. Only bumped with `refresh_lock` held.
    refresh_attempts: AtomicU64,

    cache_ttl: Duration,

    fetch_timeout: Duration,
}

impl JwksClient {
    /// Create a JWKS client with the default TTL and fetch timeout.
    pub fn new(tenant: TenantConfig) -> Self {
        Self::with_settings(tenant, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a JWKS client with a custom TTL and fetch timeout.
    ///
    /// The TTL is capped at [`MAX_CACHE_TTL`].
    pub fn with_settings(tenant: TenantConfig, cache_ttl: Duration, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gk.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            tenant,
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(LastRefresh::default()),
            refresh_attempts: AtomicU64::new(0),
            cache_ttl: cache_ttl.min(MAX_CACHE_TTL),
            fetch_timeout,
        }
    }

    pub fn tenant(&self) -> &TenantConfig {
        &self.tenant
    }

    /// Resolve the signing key for a token.
    ///
    /// The issuer selects the JWKS URI; issuers outside the tenant are
    /// rejected before any network I/O.
    ///
    /// # Errors
    ///
    /// - `InvalidIssuer` if the issuer is not one of the tenant's issuers
    /// - `JWKSUnavailable` if a needed refresh fails or times out
    /// - `SigningKeyNotFound` if `kid` is absent after a refresh
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve_key(&self, issuer: &str, kid: &str) -> Result<Arc<RsaPublicKey>, AuthError> {
        let uri = self.tenant.jwks_uri_for_issuer(issuer).ok_or_else(|| {
            tracing::debug!(target: "gk.auth.jwks", "No JWKS URI for issuer");
            AuthError::InvalidIssuer
        })?;

        self.resolve_key_from(&uri, kid).await
    }

    /// Resolve a key from an explicit JWKS URI.
    async fn resolve_key_from(&self, uri: &str, kid: &str) -> Result<Arc<RsaPublicKey>, AuthError> {
        let observed_attempt = self.refresh_attempts.load(Ordering::Acquire);

        // Fast path: fresh entry from the right URI containing the kid
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.is_fresh_for(uri, Instant::now()) {
                    if let Some(key) = entry.keys.get(kid) {
                        tracing::debug!(target: "gk.auth.jwks", kid = %kid, "JWKS cache hit");
                        record_jwks_cache_lookup("hit");
                        return Ok(Arc::clone(key));
                    }
                }
            }
        }

        let Ok(mut last) = tokio::time::timeout(self.fetch_timeout, self.refresh_lock.lock()).await
        else {
            tracing::warn!(target: "gk.auth.jwks", url = %uri, "Timed out waiting for in-flight JWKS refresh");
            record_jwks_cache_lookup("shared");
            return Err(AuthError::JwksUnavailable);
        };

        // A refresh of the same URI completed while we waited: share its outcome
        if self.refresh_attempts.load(Ordering::Acquire) != observed_attempt && last.uri == uri {
            record_jwks_cache_lookup("shared");
            if !last.succeeded {
                tracing::debug!(target: "gk.auth.jwks", url = %uri, "Concurrent JWKS refresh failed");
                return Err(AuthError::JwksUnavailable);
            }

            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.is_fresh_for(uri, Instant::now()) {
                    tracing::debug!(target: "gk.auth.jwks", kid = %kid, "Reusing concurrent JWKS refresh");
                    return Self::lookup(entry, kid);
                }
            }
        }

        record_jwks_cache_lookup("miss");
        let result = self.refresh(uri).await;
        last.uri = uri.to_string();
        last.succeeded = result.is_ok();
        self.refresh_attempts.fetch_add(1, Ordering::Release);

        Self::lookup(&*result?, kid)
    }

    fn lookup(entry: &CachedJwks, kid: &str) -> Result<Arc<RsaPublicKey>, AuthError> {
        entry.keys.get(kid).map(Arc::clone).ok_or_else(|| {
            tracing::warn!(target: "gk.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            AuthError::SigningKeyNotFound
        })
    }

    /// Fetch the key set from `uri` and swap it into the cache.
    ///
    /// Must be called with `refresh_lock` held.
    #[instrument(skip(self))]
    async fn refresh(&self, uri: &str) -> Result<Arc<CachedJwks>, AuthError> {
        tracing::debug!(target: "gk.auth.jwks", url = %uri, "Fetching JWKS");

        let start = Instant::now();
        let fetched = tokio::time::timeout(self.fetch_timeout, self.fetch(uri)).await;
        let duration = start.elapsed();

        let jwks = match fetched {
            Ok(Ok(jwks)) => {
                record_jwks_fetch("success", duration);
                jwks
            }
            Ok(Err(err)) => {
                record_jwks_fetch("error", duration);
                return Err(err);
            }
            Err(_) => {
                tracing::error!(target: "gk.auth.jwks", url = %uri, "JWKS fetch timed out");
                record_jwks_fetch("timeout", duration);
                return Err(AuthError::JwksUnavailable);
            }
        };

        let published = jwks.keys.len();
        let keys: HashMap<String, Arc<RsaPublicKey>> = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                let key = RsaPublicKey::from_jwk(jwk);
                if key.is_none() {
                    tracing::debug!(
                        target: "gk.auth.jwks",
                        kid = ?jwk.kid,
                        kty = %jwk.kty,
                        "Skipping unusable JWK"
                    );
                }
                key
            })
            .map(|key| (key.kid.clone(), Arc::new(key)))
            .collect();

        let now = Instant::now();
        let expires_at = now.checked_add(self.cache_ttl).unwrap_or_else(|| {
            tracing::error!(target: "gk.auth.jwks", "JWKS cache TTL overflows the clock, entry expires immediately");
            now
        });

        let mut cache = self.cache.write().await;
        let entry = Arc::new(CachedJwks {
            keys,
            uri: uri.to_string(),
            expires_at,
        });
        *cache = Some(Arc::clone(&entry));

        tracing::info!(
            target: "gk.auth.jwks",
            key_count = entry.keys.len(),
            skipped = published - entry.keys.len(),
            "JWKS cache refreshed"
        );

        Ok(entry)
    }

    async fn fetch(&self, uri: &str) -> Result<JwksResponse, AuthError> {
        let response = self.http_client.get(uri).send().await.map_err(|e| {
            tracing::error!(target: "gk.auth.jwks", error = %e, "Failed to fetch JWKS");
            AuthError::JwksUnavailable
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gk.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::JwksUnavailable);
        }

        response.json::<JwksResponse>().await.map_err(|e| {
            tracing::error!(target: "gk.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::JwksUnavailable
        })
    }
}
