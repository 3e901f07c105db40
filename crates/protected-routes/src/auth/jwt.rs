//! JWT verification pipeline.
//!
//! [`JwtValidator`] checks a compact JWS bearer token in strict order:
//!
//! 1. decode the protected header (`alg`, `kid`) without trusting it
//! 2. resolve the key for exactly that `(alg, kid)` from the [`KeyStore`]
//! 3. strip private members from the key
//! 4. verify the signature, accepting only the header's `alg`
//! 5. decode the claims (never before step 4 succeeded)
//! 6. expiry, only with [`JwtValidatorBuilder::enforce_expiry`]
//! 7. subject via [`SubjectTest`]
//! 8. audience via [`AudienceTest`], any `aud` value may match
//! 9. scopes, only with [`JwtValidatorBuilder::enforce_scopes`]
//!
//! Every failure collapses to `false`. The cause is logged and never
//! returned to the caller.
//!
//! Requires the `jwt` feature.
//!
//! ```rust,ignore
//! use protected_routes::auth::jwt::JwtValidator;
//! use protected_routes::auth::keys::RemoteJwkSet;
//!
//! let validator = JwtValidator::builder(
//!     RemoteJwkSet::new("https://auth.example.com/.well-known/jwks.json".parse()?),
//!     |sub: String| async move { anyhow::Ok(!sub.is_empty()) },
//!     |aud: String, url: String| async move { anyhow::Ok(url.starts_with(&aud)) },
//! )
//! .enforce_expiry()
//! .build();
//! ```

use crate::auth::Validator;
use crate::auth::keys::{KeyError, KeyStore};
use crate::auth::predicate::{AudienceTest, SubjectTest};
use futures::FutureExt;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// Claims read from a verified token.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<u64>,
    /// Space-delimited scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenClaims {
    pub fn audiences(&self) -> &[String] {
        match &self.aud {
            Some(Audience::Single(aud)) => std::slice::from_ref(aud),
            Some(Audience::Multiple(auds)) => auds,
            None => &[],
        }
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.iter().flat_map(|s| s.split_whitespace())
    }
}

/// The `aud` claim, a single value or a list.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

/// Why a token was rejected. Logged, never surfaced to clients.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid token header: {0}")]
    Header(#[source] jsonwebtoken::errors::Error),

    #[error("key store lookup failed: {0}")]
    KeyStore(#[source] anyhow::Error),

    #[error("no verification key for alg {alg:?}, kid {kid:?}")]
    KeyNotFound { alg: Algorithm, kid: Option<String> },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("token verification failed: {0}")]
    Verification(#[source] jsonwebtoken::errors::Error),
}

/// Builder for [`JwtValidator`].
pub struct JwtValidatorBuilder<K, S, A> {
    key_store: K,
    subject: S,
    audience: A,
    enforce_expiry: bool,
    enforce_scopes: bool,
    leeway: u64,
}

impl<K, S, A> JwtValidatorBuilder<K, S, A> {
    /// Reject tokens whose `exp` has passed, or that carry none.
    pub fn enforce_expiry(mut self) -> Self {
        self.enforce_expiry = true;
        self
    }

    /// Reject tokens whose `scope` claim lacks any of the route's scopes.
    pub fn enforce_scopes(mut self) -> Self {
        self.enforce_scopes = true;
        self
    }

    /// Clock skew tolerated by the expiry check, in seconds.
    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    pub fn build(self) -> JwtValidator<K, S, A> {
        JwtValidator {
            inner: Arc::new(JwtValidatorInner {
                key_store: self.key_store,
                subject: self.subject,
                audience: self.audience,
                enforce_expiry: self.enforce_expiry,
                enforce_scopes: self.enforce_scopes,
                leeway: self.leeway,
            }),
        }
    }
}

struct JwtValidatorInner<K, S, A> {
    key_store: K,
    subject: S,
    audience: A,
    enforce_expiry: bool,
    enforce_scopes: bool,
    leeway: u64,
}

/// Bearer token validator backed by a [`KeyStore`].
pub struct JwtValidator<K, S, A> {
    inner: Arc<JwtValidatorInner<K, S, A>>,
}

impl<K, S, A> Clone for JwtValidator<K, S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, S, A> JwtValidator<K, S, A>
where
    K: KeyStore,
    S: SubjectTest,
    A: AudienceTest,
{
    /// Validator with expiry and scope checks disabled.
    pub fn new(key_store: K, subject: S, audience: A) -> Self {
        Self::builder(key_store, subject, audience).build()
    }

    pub fn builder(key_store: K, subject: S, audience: A) -> JwtValidatorBuilder<K, S, A> {
        JwtValidatorBuilder {
            key_store,
            subject,
            audience,
            enforce_expiry: false,
            enforce_scopes: false,
            leeway: 0,
        }
    }

    /// Steps 1-5: only signature-verified claims leave this function.
    async fn verified_claims(&self, token: &str) -> Result<TokenClaims, ValidationError> {
        let header = decode_header(token).map_err(ValidationError::Header)?;

        let key = self
            .inner
            .key_store
            .select_verification_key(header.alg, header.kid.as_deref())
            .await
            .map_err(ValidationError::KeyStore)?
            .ok_or_else(|| ValidationError::KeyNotFound {
                alg: header.alg,
                kid: header.kid.clone(),
            })?;
        let decoding_key = key.into_public().decoding_key()?;

        // Claim checks happen below, the library only verifies the signature.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token, &decoding_key, &validation)
            .map_err(ValidationError::Verification)?;
        Ok(data.claims)
    }

    async fn verify(&self, token: &str, url: &str, scopes: &[String]) -> Result<bool, ValidationError> {
        let claims = self.verified_claims(token).await?;

        Ok(self.is_not_expired(&claims)
            && self.subject_exists(&claims.sub).await
            && self.audience_matches(&claims, url).await
            && self.scopes_match(&claims, scopes))
    }

    fn is_not_expired(&self, claims: &TokenClaims) -> bool {
        if !self.inner.enforce_expiry {
            return true;
        }
        let now = jsonwebtoken::get_current_timestamp();
        let live = claims
            .exp
            .is_some_and(|exp| exp.saturating_add(self.inner.leeway) > now);
        if !live {
            tracing::debug!(exp = ?claims.exp, now, "token expired");
        }
        live
    }

    async fn subject_exists(&self, sub: &str) -> bool {
        match self.inner.subject.test_subject(sub).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(sub, "subject rejected");
                false
            }
            Err(err) => {
                tracing::warn!(sub, error = %err, "subject test failed");
                false
            }
        }
    }

    async fn audience_matches(&self, claims: &TokenClaims, url: &str) -> bool {
        for aud in claims.audiences() {
            match self.inner.audience.test_audience(aud, url).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(aud, url, error = %err, "audience test failed");
                    return false;
                }
            }
        }
        tracing::debug!(aud = ?claims.aud, url, "no audience matched");
        false
    }

    fn scopes_match(&self, claims: &TokenClaims, required: &[String]) -> bool {
        if !self.inner.enforce_scopes {
            return true;
        }
        let granted: Vec<&str> = claims.scopes().collect();
        let missing: Vec<&String> = required
            .iter()
            .filter(|scope| !granted.contains(&scope.as_str()))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(?missing, "token lacks required scopes");
        }
        missing.is_empty()
    }
}

impl<K, S, A> Validator for JwtValidator<K, S, A>
where
    K: KeyStore,
    S: SubjectTest,
    A: AudienceTest,
{
    async fn validate(&self, token: &str, url: &str, scopes: &[String]) -> bool {
        match AssertUnwindSafe(self.verify(token, url, scopes))
            .catch_unwind()
            .await
        {
            Ok(Ok(valid)) => valid,
            Ok(Err(err)) => {
                tracing::warn!(url, error = %err, "bearer token rejected");
                false
            }
            Err(_) => {
                tracing::error!(url, "bearer token validation panicked");
                false
            }
        }
    }
}
