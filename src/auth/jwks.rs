//! Signing key retrieval and caching
//!
//! Keys come from a [`KeySource`] (the realm's certs endpoint, or a JWK set
//! obtained out-of-band) and are held in a [`JwksCache`] keyed by `kid` for
//! the configured rotation interval.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::AuthError;
use crate::config::AuthConfig;

/// A JSON Web Key Set as served by `/protocol/openid-connect/certs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// The subset of JWK members needed for RSA signature keys. Unknown members
/// (`x5c`, `x5t`, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// RSA signing keys only; encryption keys Keycloak also publishes are skipped.
    fn decoding_key(&self) -> Option<(String, DecodingKey)> {
        if self.kty != "RSA" || self.key_use.as_deref() == Some("enc") {
            return None;
        }
        let kid = self.kid.clone()?;
        let (n, e) = (self.n.as_deref()?, self.e.as_deref()?);
        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => Some((kid, key)),
            Err(err) => {
                warn!(kid = %kid, error = %err, "Skipping malformed RSA key");
                None
            }
        }
    }
}

/// Where signing keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AuthError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Fetches the realm's JWKS over HTTP(S).
pub struct HttpKeySource {
    client: Client,
    url: String,
}

impl HttpKeySource {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure_tls)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: config.certs_url(),
        })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!(url = %self.url, "Fetching signing keys");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "HTTP error contacting JWKS endpoint");
            AuthError::UpstreamUnavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, http_status = %status, "JWKS endpoint returned error status");
            return Err(AuthError::UpstreamUnavailable(format!(
                "JWKS endpoint returned HTTP {}",
                status
            )));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "Failed to parse JWKS response");
            AuthError::UpstreamUnavailable(format!("malformed JWKS response: {}", e))
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// A fixed key set, e.g. exported from the provider ahead of time.
pub struct StaticKeySource {
    keys: JwkSet,
    origin: String,
}

impl StaticKeySource {
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys,
            origin: "static key set".to_string(),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuthError::UpstreamUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let keys: JwkSet = serde_json::from_str(&raw).map_err(|e| {
            AuthError::UpstreamUnavailable(format!("invalid JWKS in {}: {}", path.display(), e))
        })?;

        Ok(Self {
            keys,
            origin: path.display().to_string(),
        })
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        Ok(self.keys.clone())
    }

    fn describe(&self) -> String {
        self.origin.clone()
    }
}

#[derive(Default)]
struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    /// Last successful fetch.
    fetched_at: Option<DateTime<Utc>>,
    /// Last fetch, successful or not; refetches are spaced from this.
    attempted_at: Option<DateTime<Utc>>,
    last_failure: Option<AuthError>,
}

/// `kid` → decoding key, refreshed when older than the TTL or when an
/// unknown `kid` shows up.
///
/// Fetches happen at most once per `min_refresh`, whether or not the last one
/// succeeded. A failed fetch keeps the previous keys in service.
pub struct JwksCache {
    source: Arc<dyn KeySource>,
    cached: RwLock<CachedKeys>,
    ttl: Duration,
    min_refresh: Duration,
}

impl JwksCache {
    pub fn new(
        source: Arc<dyn KeySource>,
        ttl: std::time::Duration,
        min_refresh: std::time::Duration,
    ) -> Self {
        Self {
            source,
            cached: RwLock::new(CachedKeys::default()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(300)),
            min_refresh: Duration::from_std(min_refresh).unwrap_or_else(|_| Duration::seconds(10)),
        }
    }

    pub fn from_config(source: Arc<dyn KeySource>, config: &AuthConfig) -> Self {
        Self::new(source, config.jwks_ttl, config.jwks_min_refresh)
    }

    /// Decoding key for `kid`, fetching the key set if needed.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(lookup) = self.lookup(&cached, kid, Utc::now()) {
                return lookup;
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(lookup) = self.lookup(&cached, kid, Utc::now()) {
            return lookup;
        }

        if let Err(e) = self.refresh(&mut cached).await {
            return match cached.keys.get(kid) {
                Some(key) => {
                    warn!(kid = %kid, "Key set refresh failed; using previously fetched key");
                    Ok(key.clone())
                }
                None if cached.keys.is_empty() => Err(e),
                None => Err(AuthError::key_not_found()),
            };
        }

        cached.keys.get(kid).cloned().ok_or_else(|| {
            warn!(kid = %kid, "No signing key with this kid after refresh");
            AuthError::key_not_found()
        })
    }

    /// Loads the key set eagerly; returns the number of usable keys.
    pub async fn prefetch(&self) -> Result<usize, AuthError> {
        let mut cached = self.cached.write().await;
        self.refresh(&mut cached).await?;
        Ok(cached.keys.len())
    }

    /// `Some` when the cache can answer without fetching.
    fn lookup(
        &self,
        cached: &CachedKeys,
        kid: &str,
        now: DateTime<Utc>,
    ) -> Option<Result<DecodingKey, AuthError>> {
        let fresh = cached.fetched_at.map_or(false, |at| now - at < self.ttl);
        let throttled = cached
            .attempted_at
            .map_or(false, |at| now - at < self.min_refresh);

        match cached.keys.get(kid) {
            Some(key) if fresh || throttled => Some(Ok(key.clone())),
            Some(_) => None,
            None if throttled => Some(Err(match &cached.last_failure {
                Some(failure) if cached.keys.is_empty() => failure.clone(),
                _ => AuthError::key_not_found(),
            })),
            None => None,
        }
    }

    /// Fetches the key set; a failure leaves the current keys in place.
    async fn refresh(&self, cached: &mut CachedKeys) -> Result<(), AuthError> {
        let now = Utc::now();
        cached.attempted_at = Some(now);

        match self.load().await {
            Ok(keys) => {
                cached.keys = keys;
                cached.fetched_at = Some(now);
                cached.last_failure = None;
                Ok(())
            }
            Err(e) => {
                cached.last_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn load(&self) -> Result<HashMap<String, DecodingKey>, AuthError> {
        let set = self.source.fetch().await?;
        let keys: HashMap<String, DecodingKey> =
            set.keys.iter().filter_map(Jwk::decoding_key).collect();

        info!(
            source = %self.source.describe(),
            published = set.keys.len(),
            usable = keys.len(),
            "Loaded signing keys"
        );
        Ok(keys)
    }
}
