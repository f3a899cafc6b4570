//! Authorization handler.
//!
//! Installed as the router fallback for all methods; paths outside the
//! configured endpoints are answered 404 before any credential is examined.

use crate::errors::GatewayError;
use crate::models::AuthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Authorize a request.
///
/// ## Response
///
/// - 200 `{"message": "Authorization successful"}` when accepted
/// - 401 `{"message": "Not authorized"}` otherwise
/// - 404 `{"message": "Not found"}` off the configured endpoints
#[instrument(skip_all, name = "gateway.authorize", fields(path = %uri.path()))]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>, GatewayError> {
    if !state.endpoints.matches(uri.path()) {
        return Err(GatewayError::NotFound);
    }

    let verdict = state.decision.decide(&headers).await;

    verdict
        .outcome
        .map(|()| Json(AuthResponse::authorized()))
        .map_err(GatewayError::Unauthorized)
}
