//! HTTP Basic credential verification.
//!
//! Credentials are compared as SHA-256 digests with a constant-time equality,
//! so neither the comparison time nor an early exit reveals how much of the
//! username or password matched, or their lengths.

use crate::errors::RejectReason;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::secret::{ExposeSecret, SecretString};
use ring::digest::{digest, SHA256};
use subtle::ConstantTimeEq;
use tracing::instrument;

const BASIC_SCHEME: &str = "basic ";

/// Verifies `Authorization: Basic <base64(user:pass)>` against one configured
/// credential pair.
pub struct BasicAuthVerifier {
    username: String,
    password: SecretString,
}

impl std::fmt::Debug for BasicAuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthVerifier")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl BasicAuthVerifier {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Verify the raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` - no header
    /// - `MalformedHeader` - wrong scheme, bad base64, non-UTF-8, or no `:`
    /// - `BadCredentials` - username or password differs
    #[instrument(skip_all)]
    pub fn verify(&self, authorization: Option<&str>) -> Result<(), RejectReason> {
        let value = authorization.ok_or(RejectReason::MissingCredentials)?;
        let (username, password) = parse_basic(value).ok_or_else(|| {
            tracing::debug!(target: "gateway.auth.basic", "Malformed Basic authorization header");
            RejectReason::MalformedHeader
        })?;

        let username_ok = digest_eq(username.as_bytes(), self.username.as_bytes());
        let password_ok = digest_eq(
            password.as_bytes(),
            self.password.expose_secret().as_bytes(),
        );

        if bool::from(username_ok & password_ok) {
            Ok(())
        } else {
            tracing::debug!(target: "gateway.auth.basic", "Basic credentials did not match");
            Err(RejectReason::BadCredentials)
        }
    }
}

/// Decode `Basic <base64>` into `(username, password)`.
///
/// The scheme is case-insensitive; the password may contain `:`.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let scheme = value.get(..BASIC_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
        return None;
    }
    let encoded = value.get(BASIC_SCHEME.len()..)?;

    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn digest_eq(provided: &[u8], expected: &[u8]) -> subtle::Choice {
    let provided = digest(&SHA256, provided);
    let expected = digest(&SHA256, expected);
    provided.as_ref().ct_eq(expected.as_ref())
}
