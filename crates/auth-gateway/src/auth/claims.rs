//! JWT claims and issuer/audience checks.
//!
//! `iss` and `aud` must both be JSON strings. An array-valued `aud` fails to
//! deserialize and is rejected as invalid claims. The `sub` field is redacted in
//! Debug output.

use crate::errors::RejectReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims extracted from a verified token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer.
    pub iss: String,

    /// Audience. Single string only.
    pub aud: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Checks `iss` and `aud` against configured values by exact, case-sensitive
/// string equality. No normalization is applied.
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    issuer: String,
    audience: String,
}

impl ClaimValidator {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Issuer is checked before audience, so a token wrong on both counts is
    /// reported as an issuer mismatch.
    pub fn check(&self, claims: &Claims) -> Result<(), RejectReason> {
        if claims.iss != self.issuer {
            return Err(RejectReason::IssuerMismatch);
        }
        if claims.aud != self.audience {
            return Err(RejectReason::AudienceMismatch);
        }
        Ok(())
    }
}
