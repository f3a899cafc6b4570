//! JWKS key set provider.
//!
//! Fetches the JSON Web Key Set from the configured URL and turns each usable
//! JWK into a verification key indexed by `kid`. How long a fetched set is
//! trusted is decided by [`KeySetPolicy`]:
//!
//! - `Static` - fetched once at startup, held for the process lifetime
//! - `PerRequest` - fetched fresh for every verification, never stored
//! - `Refresh(interval)` - cached, refetched once older than `interval`
//!
//! # Security
//!
//! - A key set with zero usable keys is an error (fail closed)
//! - Symmetric (`oct`) and encryption-only keys are never used for verification
//! - A failed refetch is surfaced to the caller; stale keys are not served
//! - The fetch has a bounded timeout

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// Default timeout for a single JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while acquiring a key set.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("Key set unavailable: {0}")]
    Unavailable(String),

    #[error("Key set contains no usable keys")]
    NoUsableKeys,
}

/// Freshness policy for the signing key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySetPolicy {
    Static,
    PerRequest,
    Refresh(Duration),
}

impl KeySetPolicy {
    /// Map the `jwksRefreshIntervalSeconds` setting to a policy.
    ///
    /// Absent means `Static`, `0` means `PerRequest`, anything else is a
    /// refresh interval in seconds.
    pub fn from_refresh_interval(seconds: Option<u64>) -> Self {
        match seconds {
            None => KeySetPolicy::Static,
            Some(0) => KeySetPolicy::PerRequest,
            Some(secs) => KeySetPolicy::Refresh(Duration::from_secs(secs)),
        }
    }
}

impl fmt::Display for KeySetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySetPolicy::Static => write!(f, "static"),
            KeySetPolicy::PerRequest => write!(f, "per-request"),
            KeySetPolicy::Refresh(interval) => write!(f, "refresh({}s)", interval.as_secs()),
        }
    }
}

/// Key type family, used to reject tokens whose `alg` does not fit the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcP256,
    EcP384,
    Ed25519,
}

/// A public key ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    family: KeyFamily,
    pinned_alg: Option<KeyAlgorithm>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("pinned_alg", &self.pinned_alg)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Build a verification key from a JWK.
    ///
    /// Returns a human-readable reason when the JWK is not usable for
    /// signature verification.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let kid = jwk
            .common
            .key_id
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| "missing kid".to_string())?;

        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return Err(format!("key {kid} is an encryption key"));
        }

        let family = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => KeyFamily::Rsa,
            AlgorithmParameters::EllipticCurve(params) => match params.curve {
                EllipticCurve::P256 => KeyFamily::EcP256,
                EllipticCurve::P384 => KeyFamily::EcP384,
                ref other => return Err(format!("key {kid} uses unsupported curve {other:?}")),
            },
            AlgorithmParameters::OctetKeyPair(params) => match params.curve {
                EllipticCurve::Ed25519 => KeyFamily::Ed25519,
                ref other => return Err(format!("key {kid} uses unsupported curve {other:?}")),
            },
            AlgorithmParameters::OctetKey(_) => {
                return Err(format!("key {kid} is a symmetric key"));
            }
        };

        let decoding_key = DecodingKey::from_jwk(jwk)
            .map_err(|e| format!("key {kid} has unusable material: {e}"))?;

        Ok(Self {
            kid,
            family,
            pinned_alg: jwk.common.key_algorithm,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Whether a token declaring `alg` may be verified with this key.
    ///
    /// The algorithm must belong to the key's family, and must equal the JWK's
    /// own `alg` when the JWK pins one.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        let family_matches = matches!(
            (self.family, alg),
            (
                KeyFamily::Rsa,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ) | (KeyFamily::EcP256, Algorithm::ES256)
                | (KeyFamily::EcP384, Algorithm::ES384)
                | (KeyFamily::Ed25519, Algorithm::EdDSA)
        );

        family_matches
            && self
                .pinned_alg
                .map_or(true, |pinned| pinned == key_algorithm_of(alg))
    }
}

fn key_algorithm_of(alg: Algorithm) -> KeyAlgorithm {
    match alg {
        Algorithm::HS256 => KeyAlgorithm::HS256,
        Algorithm::HS384 => KeyAlgorithm::HS384,
        Algorithm::HS512 => KeyAlgorithm::HS512,
        Algorithm::ES256 => KeyAlgorithm::ES256,
        Algorithm::ES384 => KeyAlgorithm::ES384,
        Algorithm::RS256 => KeyAlgorithm::RS256,
        Algorithm::RS384 => KeyAlgorithm::RS384,
        Algorithm::RS512 => KeyAlgorithm::RS512,
        Algorithm::PS256 => KeyAlgorithm::PS256,
        Algorithm::PS384 => KeyAlgorithm::PS384,
        Algorithm::PS512 => KeyAlgorithm::PS512,
        Algorithm::EdDSA => KeyAlgorithm::EdDSA,
    }
}

/// Raw JWKS document. Entries are parsed one by one so a single odd key does
/// not invalidate the whole set.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Verification keys indexed by `kid`.
///
/// Never empty once constructed through [`KeySet::from_jwks_json`] or
/// [`KeySet::from_keys`].
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
}

impl KeySet {
    /// Parse a JWKS document body.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Unavailable` if the body is not a JWKS document and
    /// `KeySetError::NoUsableKeys` if no entry yields a verification key.
    pub fn from_jwks_json(body: &[u8]) -> Result<Self, KeySetError> {
        let document: JwksDocument = serde_json::from_slice(body).map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to parse JWKS document");
            KeySetError::Unavailable(format!("malformed JWKS document: {e}"))
        })?;

        let mut keys = Vec::with_capacity(document.keys.len());
        for entry in document.keys {
            let jwk: Jwk = match serde_json::from_value(entry) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::debug!(target: "gateway.auth.jwks", error = %e, "Ignoring unparseable JWK");
                    continue;
                }
            };
            match VerificationKey::from_jwk(&jwk) {
                Ok(key) => keys.push(key),
                Err(reason) => {
                    tracing::debug!(target: "gateway.auth.jwks", reason = %reason, "Ignoring unusable JWK");
                }
            }
        }

        Self::from_keys(keys)
    }

    /// Build a key set from already-parsed keys. The first key wins on a
    /// duplicate `kid`.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::NoUsableKeys` if `keys` is empty.
    pub fn from_keys<I>(keys: I) -> Result<Self, KeySetError>
    where
        I: IntoIterator<Item = VerificationKey>,
    {
        let mut map = HashMap::new();
        for key in keys {
            if map.contains_key(key.kid()) {
                tracing::warn!(target: "gateway.auth.jwks", kid = %key.kid(), "Duplicate kid in JWKS, keeping first");
                continue;
            }
            map.insert(key.kid.clone(), key);
        }

        if map.is_empty() {
            return Err(KeySetError::NoUsableKeys);
        }

        Ok(Self { keys: map })
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key IDs in sorted order.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Where key sets come from. Injected into [`KeySetProvider`] so tests can
/// supply fixed or failing sources.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch and parse a fresh key set. No retries.
    async fn fetch(&self) -> Result<KeySet, KeySetError>;
}

/// Fetches the JWKS over HTTP(S) with a single bounded `GET`.
pub struct HttpKeySetSource {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for `jwks_url` whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Unavailable` if the HTTP client cannot be built.
    pub fn new(jwks_url: String, timeout: Duration) -> Result<Self, KeySetError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeySetError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            jwks_url,
            http_client,
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<KeySet, KeySetError> {
        tracing::debug!(target: "gateway.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySetError::Unavailable(format!("request to {} failed: {e}", self.jwks_url))
            })?;

        if response.status() != StatusCode::OK {
            tracing::error!(
                target: "gateway.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeySetError::Unavailable(format!(
                "HTTP {} from {}",
                response.status(),
                self.jwks_url
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to read JWKS body");
            KeySetError::Unavailable(format!("failed to read body from {}: {e}", self.jwks_url))
        })?;

        let key_set = KeySet::from_jwks_json(&body)?;
        tracing::info!(
            target: "gateway.auth.jwks",
            key_count = key_set.len(),
            "JWKS fetched"
        );
        Ok(key_set)
    }
}

/// Cached key set with fetch time.
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Holds the signing key set according to a [`KeySetPolicy`].
///
/// Cached sets are immutable snapshots handed out as `Arc<KeySet>`; the lock is
/// only taken for writing when a fetch replaces the snapshot.
pub struct KeySetProvider {
    source: Arc<dyn KeySetSource>,
    policy: KeySetPolicy,
    cache: RwLock<Option<CachedKeySet>>,
}

impl KeySetProvider {
    pub fn new(source: Arc<dyn KeySetSource>, policy: KeySetPolicy) -> Self {
        Self {
            source,
            policy,
            cache: RwLock::new(None),
        }
    }

    /// Startup fetch. Returns the number of usable keys.
    ///
    /// Fills the cache for `Static` and `Refresh`; for `PerRequest` the fetched
    /// set is discarded, but an unreachable endpoint still fails startup.
    ///
    /// # Errors
    ///
    /// Any [`KeySetError`] from the source. Callers treat this as fatal.
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub async fn initialize(&self) -> Result<usize, KeySetError> {
        match self.policy {
            KeySetPolicy::PerRequest => Ok(self.source.fetch().await?.len()),
            KeySetPolicy::Static | KeySetPolicy::Refresh(_) => Ok(self.refresh().await?.len()),
        }
    }

    /// The key set to verify the current request against.
    ///
    /// # Errors
    ///
    /// Any [`KeySetError`] from a fetch this call had to perform.
    pub async fn current(&self) -> Result<Arc<KeySet>, KeySetError> {
        match self.policy {
            KeySetPolicy::PerRequest => Ok(Arc::new(self.source.fetch().await?)),
            KeySetPolicy::Static => {
                if let Some(cached) = self.cache.read().await.as_ref() {
                    return Ok(Arc::clone(&cached.keys));
                }
                self.refresh().await
            }
            KeySetPolicy::Refresh(interval) => {
                if let Some(cached) = self.cache.read().await.as_ref() {
                    if cached.fetched_at.elapsed() < interval {
                        return Ok(Arc::clone(&cached.keys));
                    }
                    tracing::debug!(target: "gateway.auth.jwks", "Cached JWKS expired");
                }
                self.refresh().await
            }
        }
    }

    async fn refresh(&self) -> Result<Arc<KeySet>, KeySetError> {
        let keys = Arc::new(self.source.fetch().await?);

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeySet {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });

        tracing::info!(
            target: "gateway.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn okp_jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": kid,
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    fn rsa_jwk(kid: &str, alg: Option<&str>) -> serde_json::Value {
        let mut jwk = serde_json::json!({
            "kty": "RSA",
            "kid": kid,
            "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw",
                "e": "AQAB",
                "use": "sig"
            });
        if let Some(alg) = alg {
            jwk["alg"] = serde_json::Value::String(alg.to_string());
        }
        jwk
    }

    fn ec_jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "EC",
            "kid": kid,
            "crv": "P-256",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0",
            "use": "sig"
        })
    }

    fn jwks_body(keys: Vec<serde_json::Value>) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "keys": keys })).unwrap()
    }

    /// Source returning a fixed key set and counting fetches.
    struct CountingSource {
        body: Vec<u8>,
        fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new(keys: Vec<serde_json::Value>) -> Self {
            Self {
                body: jwks_body(keys),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeySetSource for CountingSource {
        async fn fetch(&self) -> Result<KeySet, KeySetError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            KeySet::from_jwks_json(&self.body)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl KeySetSource for FailingSource {
        async fn fetch(&self) -> Result<KeySet, KeySetError> {
            Err(KeySetError::Unavailable("connection refused".to_string()))
        }
    }

    /// Source that serves the key set once, then is down.
    struct OneShotSource {
        body: Vec<u8>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl KeySetSource for OneShotSource {
        async fn fetch(&self) -> Result<KeySet, KeySetError> {
            if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
                KeySet::from_jwks_json(&self.body)
            } else {
                Err(KeySetError::Unavailable("HTTP 503".to_string()))
            }
        }
    }

    // =========================================================================
    // KeySetPolicy
    // =========================================================================

    #[test]
    fn test_policy_from_refresh_interval() {
        assert_eq!(KeySetPolicy::from_refresh_interval(None), KeySetPolicy::Static);
        assert_eq!(
            KeySetPolicy::from_refresh_interval(Some(0)),
            KeySetPolicy::PerRequest
        );
        assert_eq!(
            KeySetPolicy::from_refresh_interval(Some(300)),
            KeySetPolicy::Refresh(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(KeySetPolicy::Static.to_string(), "static");
        assert_eq!(KeySetPolicy::PerRequest.to_string(), "per-request");
        assert_eq!(
            KeySetPolicy::Refresh(Duration::from_secs(60)).to_string(),
            "refresh(60s)"
        );
    }

    // =========================================================================
    // KeySet parsing
    // =========================================================================

    #[test]
    fn test_key_set_parses_mixed_key_types() {
        let body = jwks_body(vec![
            okp_jwk("ed-1"),
            rsa_jwk("rsa-1", Some("RS256")),
            ec_jwk("ec-1"),
        ]);

        let key_set = KeySet::from_jwks_json(&body).unwrap();

        assert_eq!(key_set.len(), 3);
        assert_eq!(key_set.key_ids(), vec!["ec-1", "ed-1", "rsa-1"]);
        assert_eq!(key_set.get("ed-1").unwrap().family(), KeyFamily::Ed25519);
        assert_eq!(key_set.get("rsa-1").unwrap().family(), KeyFamily::Rsa);
        assert_eq!(key_set.get("ec-1").unwrap().family(), KeyFamily::EcP256);
        assert!(key_set.get("missing").is_none());
    }

    #[test]
    fn test_key_set_skips_unusable_keys() {
        let body = jwks_body(vec![
            serde_json::json!({"kty": "oct", "kid": "hmac", "k": "c2VjcmV0"}),
            serde_json::json!({"kty": "OKP", "crv": "Ed25519", "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}),
            serde_json::json!({"kty": "unknown", "kid": "weird"}),
            {
                let mut enc = rsa_jwk("enc-key", None);
                enc["use"] = serde_json::Value::String("enc".to_string());
                enc
            },
            okp_jwk("good"),
        ]);

        let key_set = KeySet::from_jwks_json(&body).unwrap();

        assert_eq!(key_set.key_ids(), vec!["good"]);
    }

    #[test]
    fn test_key_set_without_usable_keys_fails_closed() {
        let body = jwks_body(vec![serde_json::json!({"kty": "oct", "kid": "hmac", "k": "c2VjcmV0"})]);
        assert!(matches!(
            KeySet::from_jwks_json(&body),
            Err(KeySetError::NoUsableKeys)
        ));

        let empty = jwks_body(vec![]);
        assert!(matches!(
            KeySet::from_jwks_json(&empty),
            Err(KeySetError::NoUsableKeys)
        ));
    }

    #[test]
    fn test_key_set_rejects_malformed_document() {
        for body in [&b"not json"[..], br#"{"keys": "nope"}"#, br#"{"other": []}"#] {
            assert!(matches!(
                KeySet::from_jwks_json(body),
                Err(KeySetError::Unavailable(_))
            ));
        }
    }

    #[test]
    fn test_key_set_keeps_first_duplicate_kid() {
        let body = jwks_body(vec![okp_jwk("dup"), rsa_jwk("dup", Some("RS256"))]);
        let key_set = KeySet::from_jwks_json(&body).unwrap();

        assert_eq!(key_set.len(), 1);
        assert_eq!(key_set.get("dup").unwrap().family(), KeyFamily::Ed25519);
    }

    // =========================================================================
    // Algorithm / key family matching
    // =========================================================================

    fn single_key(jwk: serde_json::Value) -> VerificationKey {
        let jwk: Jwk = serde_json::from_value(jwk).unwrap();
        VerificationKey::from_jwk(&jwk).unwrap()
    }

    #[test]
    fn test_okp_key_accepts_only_eddsa() {
        let key = single_key(okp_jwk("ed"));
        assert!(key.accepts(Algorithm::EdDSA));
        assert!(!key.accepts(Algorithm::RS256));
        assert!(!key.accepts(Algorithm::HS256));
        assert!(!key.accepts(Algorithm::ES256));
    }

    #[test]
    fn test_rsa_key_without_pinned_alg_accepts_rsa_family() {
        let key = single_key(rsa_jwk("rsa", None));
        for alg in [
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ] {
            assert!(key.accepts(alg), "{alg:?} should be accepted");
        }
        assert!(!key.accepts(Algorithm::HS256));
        assert!(!key.accepts(Algorithm::EdDSA));
    }

    #[test]
    fn test_rsa_key_with_pinned_alg_accepts_only_that_alg() {
        let key = single_key(rsa_jwk("rsa", Some("RS256")));
        assert!(key.accepts(Algorithm::RS256));
        assert!(!key.accepts(Algorithm::RS512));
        assert!(!key.accepts(Algorithm::PS256));
    }

    #[test]
    fn test_ec_key_accepts_matching_curve_only() {
        let key = single_key(ec_jwk("ec"));
        assert!(key.accepts(Algorithm::ES256));
        assert!(!key.accepts(Algorithm::ES384));
        assert!(!key.accepts(Algorithm::RS256));
    }

    #[test]
    fn test_verification_key_debug_omits_material() {
        let key = single_key(okp_jwk("ed"));
        let debug = format!("{key:?}");
        assert!(debug.contains("ed"));
        assert!(!debug.contains("11qYAYKxCrfVS"));
    }

    // =========================================================================
    // KeySetProvider policies
    // =========================================================================

    #[tokio::test]
    async fn test_static_policy_fetches_once() {
        let source = Arc::new(CountingSource::new(vec![okp_jwk("k1")]));
        let provider = KeySetProvider::new(source.clone(), KeySetPolicy::Static);

        assert_eq!(provider.initialize().await.unwrap(), 1);
        for _ in 0..5 {
            let keys = provider.current().await.unwrap();
            assert!(keys.get("k1").is_some());
        }

        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_static_policy_fetches_lazily_without_initialize() {
        let source = Arc::new(CountingSource::new(vec![okp_jwk("k1")]));
        let provider = KeySetProvider::new(source.clone(), KeySetPolicy::Static);

        provider.current().await.unwrap();
        provider.current().await.unwrap();

        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_per_request_policy_fetches_every_call() {
        let source = Arc::new(CountingSource::new(vec![okp_jwk("k1")]));
        let provider = KeySetProvider::new(source.clone(), KeySetPolicy::PerRequest);

        provider.initialize().await.unwrap();
        provider.current().await.unwrap();
        provider.current().await.unwrap();

        assert_eq!(source.fetches(), 3);
        assert!(provider.cache.read().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_policy_uses_cache_within_interval() {
        let source = Arc::new(CountingSource::new(vec![okp_jwk("k1")]));
        let provider = KeySetProvider::new(
            source.clone(),
            KeySetPolicy::Refresh(Duration::from_secs(3600)),
        );

        provider.initialize().await.unwrap();
        provider.current().await.unwrap();
        provider.current().await.unwrap();

        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_refresh_policy_refetches_after_interval() {
        let source = Arc::new(CountingSource::new(vec![okp_jwk("k1")]));
        let provider = KeySetProvider::new(
            source.clone(),
            KeySetPolicy::Refresh(Duration::from_millis(20)),
        );

        provider.initialize().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        provider.current().await.unwrap();

        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_refresh_policy_failed_refetch_does_not_serve_stale_keys() {
        let source = Arc::new(OneShotSource {
            body: jwks_body(vec![okp_jwk("k1")]),
            fetches: AtomicUsize::new(0),
        });
        let provider = KeySetProvider::new(
            source.clone(),
            KeySetPolicy::Refresh(Duration::from_millis(20)),
        );

        provider.initialize().await.unwrap();
        assert!(provider.current().await.unwrap().get("k1").is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(matches!(
            provider.current().await,
            Err(KeySetError::Unavailable(_))
        ));
        assert!(provider.current().await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_initialize_propagates_source_failure() {
        for policy in [
            KeySetPolicy::Static,
            KeySetPolicy::PerRequest,
            KeySetPolicy::Refresh(Duration::from_secs(60)),
        ] {
            let provider = KeySetProvider::new(Arc::new(FailingSource), policy);
            assert!(
                matches!(
                    provider.initialize().await,
                    Err(KeySetError::Unavailable(_))
                ),
                "policy {policy} should fail startup"
            );
            assert!(provider.current().await.is_err());
        }
    }

    // =========================================================================
    // HttpKeySetSource
    // =========================================================================

    #[tokio::test]
    async fn test_http_source_fetches_jwks() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "keys": [okp_jwk("remote-1")] })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = HttpKeySetSource::new(
            format!("{}/.well-known/jwks.json", mock_server.uri()),
            DEFAULT_FETCH_TIMEOUT,
        )
        .unwrap();

        let key_set = source.fetch().await.unwrap();
        assert_eq!(key_set.key_ids(), vec!["remote-1"]);
    }

    #[tokio::test]
    async fn test_http_source_rejects_non_200() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source =
            HttpKeySetSource::new(format!("{}/jwks", mock_server.uri()), DEFAULT_FETCH_TIMEOUT)
                .unwrap();

        let err = source.fetch().await.expect_err("503 should fail");
        assert!(
            matches!(&err, KeySetError::Unavailable(msg) if msg.contains("503")),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_http_source_rejects_malformed_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let source =
            HttpKeySetSource::new(format!("{}/jwks", mock_server.uri()), DEFAULT_FETCH_TIMEOUT)
                .unwrap();

        assert!(matches!(
            source.fetch().await,
            Err(KeySetError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_http_source_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "keys": [okp_jwk("slow")] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let source = HttpKeySetSource::new(
            format!("{}/jwks", mock_server.uri()),
            Duration::from_millis(100),
        )
        .unwrap();

        assert!(matches!(
            source.fetch().await,
            Err(KeySetError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_http_source_unreachable_endpoint() {
        // Port 9 (discard) on loopback is not expected to accept HTTP
        let source = HttpKeySetSource::new(
            "http://127.0.0.1:9/jwks".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(matches!(
            source.fetch().await,
            Err(KeySetError::Unavailable(_))
        ));
    }
}
