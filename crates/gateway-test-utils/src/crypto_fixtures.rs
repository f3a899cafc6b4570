//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 signing keys, their JWK/JWKS documents, and
//! helpers for minting tokens (including deliberately broken ones).
//! All keys are deterministic based on seed values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Ed25519 signing key with a `kid`, as published by a test identity provider.
///
/// # Example
/// ```rust,ignore
/// let key = TestSigningKey::new(1, "key-1")?;
/// let jwks = jwks_json(&[&key]);
/// let token = key.sign(&TestTokenBuilder::new().build());
/// ```
pub struct TestSigningKey {
    kid: String,
    public_key: Vec<u8>,
    pkcs8: Vec<u8>,
}

impl TestSigningKey {
    /// Create a deterministic signing key. The same seed always produces the
    /// same keypair.
    pub fn new(seed: u8, kid: &str) -> Result<Self, FixtureError> {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes).map_err(|e| {
            FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e))
        })?;

        Ok(Self {
            kid: kid.to_string(),
            public_key: key_pair.public_key().as_ref().to_vec(),
            pkcs8: build_pkcs8_from_seed(&seed_bytes),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public key as base64url (the JWK `x` parameter).
    pub fn public_key_x(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.public_key)
    }

    /// Public JWK for this key.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": self.public_key_x(),
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    /// Sign `claims` as an EdDSA JWT with this key's `kid`.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(claims, &self.kid)
    }

    /// Sign `claims` but advertise a different `kid` in the header.
    pub fn sign_with_kid(&self, claims: &Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &EncodingKey::from_ed_der(&self.pkcs8))
            .expect("Failed to sign test token")
    }
}

/// JWKS document containing the given keys.
pub fn jwks_json(keys: &[&TestSigningKey]) -> Value {
    json!({
        "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}

/// HS256 token carrying `kid`, signed with `secret`.
///
/// Used to check that a token cannot pick a symmetric algorithm for an
/// asymmetric key.
pub fn hs256_token(claims: &Value, kid: &str, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("Failed to sign HS256 token")
}

/// Assemble a token from raw header/claims JSON and a literal signature.
pub fn unsigned_token(header: &Value, claims: &Value, signature: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}

/// Flip one character in the signature segment.
pub fn tamper_signature(token: &str) -> String {
    let mut chars: Vec<char> = token.chars().collect();
    let last = chars.len() - 2;
    chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { version INTEGER 0, AlgorithmIdentifier { OID 1.3.101.112 },
    //            privateKey OCTET STRING { OCTET STRING seed } }
    let mut pkcs8 = Vec::with_capacity(48);
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);
    pkcs8
}
