//! Per-request authorization decision.
//!
//! The presence header selects the path: present with a non-empty value means
//! JWT, anything else means Basic. Once the JWT path is selected, its outcome
//! is final. Basic credentials sent alongside are never consulted.

use crate::auth::basic::BasicAuthVerifier;
use crate::auth::claims::ClaimValidator;
use crate::auth::jwks::KeySetProvider;
use crate::auth::jwt::JwtVerifier;
use crate::config::Config;
use crate::errors::RejectReason;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderName};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Upper bound on one JWT verification, key set fetch included. Must stay
/// below [`crate::routes::REQUEST_TIMEOUT`].
pub const JWT_VERIFY_TIMEOUT: Duration = Duration::from_secs(25);

/// Which verifier handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    Jwt,
    Basic,
}

impl fmt::Display for AuthPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPath::Jwt => write!(f, "jwt"),
            AuthPath::Basic => write!(f, "basic"),
        }
    }
}

/// Result of one authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthVerdict {
    pub path: AuthPath,
    pub outcome: Result<(), RejectReason>,
}

impl AuthVerdict {
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Routes each request to the JWT or Basic verifier.
pub struct AuthDecision {
    presence_header: HeaderName,
    jwt: JwtVerifier,
    basic: BasicAuthVerifier,
}

impl AuthDecision {
    pub fn new(presence_header: HeaderName, jwt: JwtVerifier, basic: BasicAuthVerifier) -> Self {
        Self {
            presence_header,
            jwt,
            basic,
        }
    }

    /// Build both verifiers from configuration and a shared key set provider.
    pub fn from_config(config: &Config, key_set: Arc<KeySetProvider>) -> Self {
        let jwt = JwtVerifier::new(
            key_set,
            ClaimValidator::new(config.issuer.clone(), config.audience.clone()),
            config.jwt_clock_skew,
        );
        let basic = BasicAuthVerifier::new(
            config.basic_username.clone(),
            config.basic_password.clone(),
        );
        Self::new(config.presence_header.clone(), jwt, basic)
    }

    /// Pick the verification path for a request.
    pub fn select_path(&self, headers: &HeaderMap) -> AuthPath {
        match headers.get(&self.presence_header) {
            Some(value) if !value.is_empty() => AuthPath::Jwt,
            _ => AuthPath::Basic,
        }
    }

    /// Decide a request and log the verdict.
    #[instrument(skip_all)]
    pub async fn decide(&self, headers: &HeaderMap) -> AuthVerdict {
        let path = self.select_path(headers);

        // A non-visible-ASCII Authorization value is treated as present but
        // malformed, never as missing.
        let authorization = headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default());

        let outcome = match path {
            AuthPath::Jwt => {
                match tokio::time::timeout(JWT_VERIFY_TIMEOUT, self.jwt.verify(authorization)).await
                {
                    Ok(result) => result.map(|_| ()),
                    Err(_) => {
                        tracing::warn!(
                            target: "gateway.auth.decision",
                            timeout_secs = JWT_VERIFY_TIMEOUT.as_secs(),
                            "JWT verification timed out"
                        );
                        Err(RejectReason::KeySetUnavailable)
                    }
                }
            }
            AuthPath::Basic => self.basic.verify(authorization),
        };

        let verdict = AuthVerdict { path, outcome };
        match verdict.outcome {
            Ok(()) => {
                tracing::info!(target: "gateway.auth.decision", path = %path, "Request authorized");
            }
            Err(reason) => {
                tracing::info!(
                    target: "gateway.auth.decision",
                    path = %path,
                    reason = reason.code(),
                    "Request rejected"
                );
            }
        }
        verdict
    }
}
