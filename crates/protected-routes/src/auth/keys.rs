//! Verification keys and the stores that resolve them.
//!
//! A [`KeyStore`] maps the `(alg, kid)` pair from a token header to a JWK.
//! Keys are kept as raw JSON objects so that private members a store should
//! never have returned can be stripped before the key is used.

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, jwk::Jwk};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use url::Url;

/// JWK members carrying private key material (RFC 7518 §6.2.2, §6.3.2).
const PRIVATE_MEMBERS: [&str; 7] = ["d", "p", "q", "dp", "dq", "qi", "oth"];

/// Errors turning a JWK into something usable for verification.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("JWK is not a JSON object")]
    NotAnObject,

    #[error("malformed JWK: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported JWK: {0}")]
    Unsupported(#[from] jsonwebtoken::errors::Error),
}

/// Resolves verification keys by algorithm and key id.
pub trait KeyStore: Send + Sync + 'static {
    /// Select the key for a token signed with `alg` under `kid`.
    ///
    /// `Ok(None)` when no key matches.
    fn select_verification_key(
        &self,
        alg: Algorithm,
        kid: Option<&str>,
    ) -> impl Future<Output = Result<Option<VerificationKey>>> + Send;
}

/// A single JWK, as handed out by a [`KeyStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationKey(Map<String, Value>);

impl VerificationKey {
    pub fn from_json(value: Value) -> Result<Self, KeyError> {
        match value {
            Value::Object(members) => Ok(Self(members)),
            _ => Err(KeyError::NotAnObject),
        }
    }

    pub fn kid(&self) -> Option<&str> {
        self.member("kid")
    }

    pub fn has_private_material(&self) -> bool {
        PRIVATE_MEMBERS.iter().any(|m| self.0.contains_key(*m))
    }

    /// Drop every private member, leaving only the public key.
    pub fn into_public(mut self) -> Self {
        for member in PRIVATE_MEMBERS {
            self.0.remove(member);
        }
        self
    }

    /// Whether this key can verify a token signed with `alg` under `kid`.
    ///
    /// A key without an `alg` member matches any algorithm of its key type.
    pub fn matches(&self, alg: Algorithm, kid: Option<&str>) -> bool {
        if let Some(kid) = kid {
            if self.kid() != Some(kid) {
                return false;
            }
        }

        match self.member("alg") {
            Some(key_alg) => key_alg == alg_name(alg),
            None => self.member("kty") == Some(key_type(alg)),
        }
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, KeyError> {
        let jwk: Jwk = serde_json::from_value(Value::Object(self.0.clone()))?;
        Ok(DecodingKey::from_jwk(&jwk)?)
    }

    fn member(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

fn alg_name(alg: Algorithm) -> &'static str {
    match alg {
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
        Algorithm::EdDSA => "EdDSA",
    }
}

fn key_type(alg: Algorithm) -> &'static str {
    match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => "oct",
        Algorithm::ES256 | Algorithm::ES384 => "EC",
        Algorithm::EdDSA => "OKP",
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => "RSA",
    }
}

#[derive(Deserialize)]
struct RawJwkSet {
    keys: Vec<Value>,
}

/// In-memory JWK set.
#[derive(Clone, Debug, Default)]
pub struct JwkSetStore {
    keys: Arc<Vec<VerificationKey>>,
}

impl JwkSetStore {
    pub fn new(keys: Vec<VerificationKey>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Parse a JWKS document (`{"keys": [...]}`).
    pub fn from_json(jwks: &str) -> Result<Self, KeyError> {
        let set: RawJwkSet = serde_json::from_str(jwks)?;
        let keys = set
            .keys
            .into_iter()
            .map(VerificationKey::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(keys))
    }

    pub fn find(&self, alg: Algorithm, kid: Option<&str>) -> Option<VerificationKey> {
        self.keys.iter().find(|key| key.matches(alg, kid)).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyStore for JwkSetStore {
    async fn select_verification_key(
        &self,
        alg: Algorithm,
        kid: Option<&str>,
    ) -> Result<Option<VerificationKey>> {
        Ok(self.find(alg, kid))
    }
}

/// Lookups that miss within this long of the last fetch do not refetch.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct RemoteJwkSetInner {
    url: Url,
    client: reqwest::Client,
    cache: RwLock<JwkSetStore>,
    /// Held for the whole fetch; records when the last one started.
    last_refresh: Mutex<Option<Instant>>,
}

/// JWK set fetched from a remote JWKS endpoint.
///
/// The set is fetched lazily and re-fetched when a lookup misses, which
/// picks up rotated keys. Concurrent misses share a single fetch, and no
/// fetch starts within the minimum refresh interval of the previous one.
#[derive(Clone)]
pub struct RemoteJwkSet {
    inner: Arc<RemoteJwkSetInner>,
    min_refresh_interval: Duration,
}

impl RemoteJwkSet {
    pub fn new(url: Url) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: Url, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(RemoteJwkSetInner {
                url,
                client,
                cache: RwLock::new(JwkSetStore::default()),
                last_refresh: Mutex::new(None),
            }),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Throttle miss-triggered fetches to one per `interval`.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Re-fetch the JWK set from the configured endpoint, ignoring the
    /// refresh interval.
    pub async fn refresh(&self) -> Result<()> {
        let mut last_refresh = self.inner.last_refresh.lock().await;
        self.fetch(&mut last_refresh).await
    }

    async fn fetch(&self, last_refresh: &mut Option<Instant>) -> Result<()> {
        // stamped before the request, so failed fetches are throttled too
        *last_refresh = Some(Instant::now());
        let jwks = fetch_jwks(&self.inner.client, &self.inner.url).await?;
        *self.inner.cache.write().await = jwks;
        Ok(())
    }

    async fn cached(&self, alg: Algorithm, kid: Option<&str>) -> Option<VerificationKey> {
        self.inner.cache.read().await.find(alg, kid)
    }
}

impl KeyStore for RemoteJwkSet {
    async fn select_verification_key(
        &self,
        alg: Algorithm,
        kid: Option<&str>,
    ) -> Result<Option<VerificationKey>> {
        if let Some(key) = self.cached(alg, kid).await {
            return Ok(Some(key));
        }

        let mut last_refresh = self.inner.last_refresh.lock().await;
        // another lookup may have refreshed while this one waited
        if let Some(key) = self.cached(alg, kid).await {
            return Ok(Some(key));
        }
        if last_refresh.is_some_and(|at| at.elapsed() < self.min_refresh_interval) {
            tracing::debug!(url = %self.inner.url, ?kid, "verification key not cached, JWKS refreshed recently");
            return Ok(None);
        }

        tracing::debug!(url = %self.inner.url, ?kid, "verification key not cached, refreshing JWKS");
        self.fetch(&mut last_refresh)
            .await
            .context("JWKS refresh failed")?;
        Ok(self.cached(alg, kid).await)
    }
}

async fn fetch_jwks(client: &reqwest::Client, url: &Url) -> Result<JwkSetStore> {
    let body = client
        .get(url.clone())
        .send()
        .await
        .context("failed to fetch JWKS")?
        .error_for_status()
        .context("JWKS endpoint returned an error")?
        .text()
        .await
        .context("failed to read JWKS")?;
    JwkSetStore::from_json(&body).context("failed to parse JWKS")
}

/// Either a local or a remote JWK set.
#[derive(Clone)]
pub enum JwkSource {
    Local(JwkSetStore),
    Remote(RemoteJwkSet),
}

impl KeyStore for JwkSource {
    async fn select_verification_key(
        &self,
        alg: Algorithm,
        kid: Option<&str>,
    ) -> Result<Option<VerificationKey>> {
        match self {
            JwkSource::Local(store) => store.select_verification_key(alg, kid).await,
            JwkSource::Remote(store) => store.select_verification_key(alg, kid).await,
        }
    }
}

impl From<JwkSetStore> for JwkSource {
    fn from(store: JwkSetStore) -> Self {
        JwkSource::Local(store)
    }
}

impl From<RemoteJwkSet> for JwkSource {
    fn from(store: RemoteJwkSet) -> Self {
        JwkSource::Remote(store)
    }
}
