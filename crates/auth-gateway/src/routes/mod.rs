//! HTTP routes for the Auth Gateway.
//!
//! Defines the Axum router, endpoint matching and application state.

use crate::auth::{AuthDecision, KeySetProvider};
use crate::config::Config;
use crate::handlers;
use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied by the HTTP layer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configured endpoint paths.
///
/// A path ending in `/` matches itself and everything beneath it; any other
/// path matches only exactly. Overlapping endpoints (`/a/` and `/a/b`) are
/// allowed.
#[derive(Debug, Clone)]
pub struct EndpointMatcher {
    exact: HashSet<String>,
    subtrees: Vec<String>,
}

impl EndpointMatcher {
    pub fn new(endpoints: &[String]) -> Self {
        let mut exact = HashSet::new();
        let mut subtrees = Vec::new();
        for endpoint in endpoints {
            if endpoint.ends_with('/') {
                subtrees.push(endpoint.clone());
            } else {
                exact.insert(endpoint.clone());
            }
        }
        Self { exact, subtrees }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.exact.contains(path)
            || self
                .subtrees
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Application state shared across all handlers.
pub struct AppState {
    /// Endpoint paths the gateway answers on.
    pub endpoints: EndpointMatcher,

    /// Authorization engine.
    pub decision: AuthDecision,
}

impl AppState {
    /// Wire the authorization engine from configuration and an initialized
    /// key set provider.
    pub fn new(config: &Config, key_set: Arc<KeySetProvider>) -> Self {
        Self {
            endpoints: EndpointMatcher::new(&config.endpoints),
            decision: AuthDecision::from_config(config, key_set),
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - the authorize handler on every configured endpoint, any method
/// - 404 for every other path
/// - TraceLayer for request logging
/// - [`REQUEST_TIMEOUT`] request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .fallback(handlers::authorize)
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
