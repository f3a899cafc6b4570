//! JWT pre-parse utilities shared across gateway crates.
//!
//! Everything here runs BEFORE a token is trusted:
//! - Bearer prefix handling for the `Authorization` header
//! - Size limits for DoS prevention
//! - Key ID extraction from the (unverified) JWT header
//! - Clock skew bounds used when validating `exp`/`nbf`
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - The header is only used to pick a key; the token MUST still be verified
//! - Error messages are generic; details go to debug logs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Literal prefix of a bearer credential in the `Authorization` header.
///
/// Matching is case-sensitive with exactly one space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical access tokens are well under 2KB. Anything larger is rejected before
/// base64 decoding or signature verification is attempted.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance applied to `exp` and `nbf`.
///
/// Zero: a token is expired the second its `exp` passes.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(0);

/// Maximum allowed clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while pre-parsing an untrusted token.
///
/// All variants display the same generic message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not `header.payload.signature` or its header is not base64url JSON.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header has no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Functions
// =============================================================================

/// Strip the `Bearer ` prefix from an `Authorization` header value.
///
/// Returns `None` when the prefix is absent. The match is exact: `bearer `,
/// `Bearer` without a space, or a leading space all fail.
#[must_use]
pub fn strip_bearer(header_value: &str) -> Option<&str> {
    header_value.strip_prefix(BEARER_PREFIX)
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not three segments, bad base64url, or header not JSON
/// - `MissingKid` - `kid` absent, not a string, or empty
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let segments = token.split('.').count();
    if segments != 3 {
        tracing::debug!(
            target: "common.jwt",
            segments,
            "Token rejected: expected header.payload.signature"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let (header_part, _) = token
        .split_once('.')
        .ok_or(JwtValidationError::MalformedToken)?;

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("kid")
        .and_then(serde_json::Value::as_str)
        .filter(|kid| !kid.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}

// =============================================================================
// Tests
// =============================================================================
