//! Bearer JWT verification.
//!
//! Verifies tokens against keys from the [`KeySetProvider`], then checks
//! temporal validity and the issuer/audience claims.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The key is selected by `kid` and the token's `alg` must fit that key;
//!   there is no fallback to another key or algorithm
//! - `exp` is required; `nbf` is honored when present
//! - Every failure maps to a [`RejectReason`]; details are logged at debug only

use crate::auth::claims::{ClaimValidator, Claims};
use crate::auth::jwks::KeySetProvider;
use crate::errors::RejectReason;
use common::jwt::{extract_kid, strip_bearer};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Verifies `Authorization: Bearer <jwt>` header values.
pub struct JwtVerifier {
    key_set: Arc<KeySetProvider>,
    claim_validator: ClaimValidator,
    leeway: Duration,
}

impl JwtVerifier {
    /// Create a verifier.
    ///
    /// `leeway` is the clock skew tolerance applied to `exp` and `nbf`.
    pub fn new(
        key_set: Arc<KeySetProvider>,
        claim_validator: ClaimValidator,
        leeway: Duration,
    ) -> Self {
        Self {
            key_set,
            claim_validator,
            leeway,
        }
    }

    /// Verify the raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns the [`RejectReason`] of the first check that failed.
    #[instrument(skip_all)]
    pub async fn verify(&self, authorization: Option<&str>) -> Result<Claims, RejectReason> {
        let token = authorization
            .and_then(strip_bearer)
            .ok_or(RejectReason::MalformedHeader)?;

        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = ?e, "Token kid extraction failed");
            RejectReason::MalformedToken
        })?;

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = %e, "Token header rejected");
            RejectReason::MalformedToken
        })?;

        let key_set = self.key_set.current().await.map_err(|e| {
            tracing::warn!(target: "gateway.auth.jwt", error = %e, "Key set unavailable");
            RejectReason::KeySetUnavailable
        })?;

        let key = key_set.get(&kid).ok_or_else(|| {
            tracing::debug!(target: "gateway.auth.jwt", kid = %kid, "Unknown key id");
            RejectReason::UnknownKeyId
        })?;

        if !key.accepts(header.alg) {
            tracing::debug!(
                target: "gateway.auth.jwt",
                kid = %kid,
                alg = ?header.alg,
                family = ?key.family(),
                "Token algorithm does not match key"
            );
            return Err(RejectReason::AlgorithmMismatch);
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // iss/aud are compared by ClaimValidator after strict decoding
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let token_data =
            decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
                let reason = reject_reason_for(e.kind());
                tracing::debug!(
                    target: "gateway.auth.jwt",
                    error = %e,
                    reason = reason.code(),
                    "Token verification failed"
                );
                reason
            })?;

        self.claim_validator.check(&token_data.claims)?;

        tracing::debug!(target: "gateway.auth.jwt", kid = %kid, "Token validated successfully");
        Ok(token_data.claims)
    }
}

fn reject_reason_for(kind: &ErrorKind) -> RejectReason {
    match kind {
        ErrorKind::InvalidSignature => RejectReason::BadSignature,
        ErrorKind::ExpiredSignature => RejectReason::Expired,
        ErrorKind::ImmatureSignature => RejectReason::NotYetValid,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            RejectReason::AlgorithmMismatch
        }
        ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => RejectReason::InvalidClaims,
        _ => RejectReason::MalformedToken,
    }
}
