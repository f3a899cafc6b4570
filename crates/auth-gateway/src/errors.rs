//! Auth Gateway error types.
//!
//! Every per-request failure carries a [`RejectReason`] for the logs, but the
//! caller only ever sees a uniform 401 `{"message": "Not authorized"}`.
//! The reason is never written to the response.

use crate::models::AuthResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Why a request was rejected.
///
/// Each variant has a stable snake_case code (see [`RejectReason::code`]) used as
/// the `reason` field in verdict logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// `Authorization` header has the wrong scheme or cannot be decoded.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// No `Authorization` header on the Basic path.
    #[error("missing credentials")]
    MissingCredentials,

    /// Bearer token is oversized, not three segments, or has no usable `kid`.
    #[error("malformed token")]
    MalformedToken,

    /// The JWKS could not be obtained for this request.
    #[error("key set unavailable")]
    KeySetUnavailable,

    /// Token `kid` is not in the current key set.
    #[error("unknown key id")]
    UnknownKeyId,

    /// Declared `alg` does not match the selected key.
    #[error("algorithm mismatch")]
    AlgorithmMismatch,

    /// Signature does not verify against the selected key.
    #[error("bad signature")]
    BadSignature,

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// `nbf` is in the future.
    #[error("token not yet valid")]
    NotYetValid,

    /// Claims are missing or have the wrong type.
    #[error("invalid claims")]
    InvalidClaims,

    /// `iss` does not equal the configured issuer.
    #[error("issuer mismatch")]
    IssuerMismatch,

    /// `aud` does not equal the configured audience.
    #[error("audience mismatch")]
    AudienceMismatch,

    /// Basic credentials do not match the configured username/password.
    #[error("bad credentials")]
    BadCredentials,
}

impl RejectReason {
    /// Stable reason code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MalformedHeader => "malformed_header",
            RejectReason::MissingCredentials => "missing_credentials",
            RejectReason::MalformedToken => "malformed_token",
            RejectReason::KeySetUnavailable => "key_set_unavailable",
            RejectReason::UnknownKeyId => "unknown_key_id",
            RejectReason::AlgorithmMismatch => "algorithm_mismatch",
            RejectReason::BadSignature => "bad_signature",
            RejectReason::Expired => "expired",
            RejectReason::NotYetValid => "not_yet_valid",
            RejectReason::InvalidClaims => "invalid_claims",
            RejectReason::IssuerMismatch => "issuer_mismatch",
            RejectReason::AudienceMismatch => "audience_mismatch",
            RejectReason::BadCredentials => "bad_credentials",
        }
    }
}

/// HTTP-facing gateway error.
///
/// On a configured endpoint the contract is binary, so the only failure
/// surfaced is 401 Unauthorized. Key set outages are rejects too, never 5xx.
/// Paths outside the configured endpoints get 404.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not authorized: {0}")]
    Unauthorized(RejectReason),

    #[error("Not found")]
    NotFound,
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized(_) => 401,
            GatewayError::NotFound => 404,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                Json(AuthResponse::not_authorized()),
            )
                .into_response(),
            GatewayError::NotFound => {
                (StatusCode::NOT_FOUND, Json(AuthResponse::not_found())).into_response()
            }
        }
    }
}
