//! Auth Gateway
//!
//! Entry point. Loads the settings file, fetches the signing key set, and
//! serves the authorization endpoints over HTTP or HTTPS.

use auth_gateway::auth::{HttpKeySetSource, KeySetProvider};
use auth_gateway::config::Config;
use auth_gateway::routes::{self, AppState};
use auth_gateway::tls;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Auth Gateway");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!(target: "gateway.config", "Failed to load configuration: {}", e);
        e
    })?;

    info!(
        target: "gateway.config",
        issuer = %config.issuer,
        audience = %config.audience,
        jwks_url = %config.jwks_url,
        presence_header = %config.presence_header,
        bind_address = %config.bind_address,
        endpoints = ?config.endpoints,
        tls = config.tls.is_some(),
        key_set_policy = %config.key_set_policy,
        "Configuration loaded successfully"
    );

    // Fetch the signing keys before accepting traffic
    let source = HttpKeySetSource::new(config.jwks_url.clone(), config.jwks_fetch_timeout)?;
    let key_set = Arc::new(KeySetProvider::new(
        Arc::new(source),
        config.key_set_policy,
    ));
    let key_count = key_set.initialize().await.map_err(|e| {
        error!(target: "gateway.auth.jwks", "Failed to fetch JWKS: {}", e);
        e
    })?;
    info!(target: "gateway.auth.jwks", key_count, "Signing keys loaded");

    // Load TLS material up front so a bad certificate fails startup
    let tls_config = match &config.tls {
        Some(tls) => Some(Arc::new(
            tls::load_server_config(&tls.cert_path, &tls.key_path).map_err(|e| {
                error!(target: "gateway.tls", "Failed to load TLS configuration: {}", e);
                e
            })?,
        )),
        None => None,
    };

    let bind_address = config.bind_address;
    let state = Arc::new(AppState::new(&config, key_set));
    let app = routes::build_routes(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    match tls_config {
        Some(tls_config) => {
            info!("Auth Gateway listening on {} (TLS)", bind_address);
            tls::serve_tls(listener, tls_config, app, shutdown_signal()).await;
        }
        None => {
            info!("Auth Gateway listening on {}", bind_address);
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
    }

    info!("Auth Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("GATEWAY_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    }
}
