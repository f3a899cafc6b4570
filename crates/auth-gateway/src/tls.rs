//! TLS listener.
//!
//! Loads a PEM certificate chain and private key into a rustls server config
//! (ring provider, h2 and http/1.1 via ALPN) and serves the router over
//! TLS-wrapped connections until shutdown is signalled, then drains them.

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to read certificates from {path}: {reason}")]
    Certificates { path: PathBuf, reason: String },

    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("Failed to read private key from {path}: {reason}")]
    PrivateKey { path: PathBuf, reason: String },

    #[error("Invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

/// Build a rustls server config from PEM files.
///
/// # Errors
///
/// Returns `TlsError` if either file is unreadable, the chain is empty, or the
/// key does not match the certificate.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, TlsError> {
    let certs = CertificateDer::pem_file_iter(cert_path)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|e| TlsError::Certificates {
            path: cert_path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    let key = PrivateKeyDer::from_pem_file(key_path).map_err(|e| TlsError::PrivateKey {
        path: key_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::info!(
        target: "gateway.tls",
        cert = %cert_path.display(),
        "TLS certificate loaded"
    );
    Ok(config)
}

/// Time a client gets to complete the TLS handshake.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve `app` over TLS on `listener` until `shutdown` completes.
///
/// On shutdown the listener stops accepting, every open connection is told to
/// finish its in-flight request and close, and this returns once all
/// connection tasks have ended.
pub async fn serve_tls<F>(
    listener: TcpListener,
    tls_config: Arc<ServerConfig>,
    app: Router,
    shutdown: F,
) where
    F: Future<Output = ()> + Send,
{
    let acceptor = TlsAcceptor::from(tls_config);
    let connections = TaskTracker::new();
    let cancel_token = CancellationToken::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(target: "gateway.tls", error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            () = &mut shutdown => {
                tracing::info!(target: "gateway.tls", "TLS listener stopped accepting connections");
                break;
            }
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());
        let cancel_token = cancel_token.clone();
        connections.spawn(async move {
            let tls_stream =
                match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                    Ok(Ok(tls_stream)) => tls_stream,
                    Ok(Err(e)) => {
                        tracing::debug!(target: "gateway.tls", peer = %peer, error = %e, "TLS handshake failed");
                        return;
                    }
                    Err(_) => {
                        tracing::debug!(target: "gateway.tls", peer = %peer, "TLS handshake timed out");
                        return;
                    }
                };

            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(tls_stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                () = cancel_token.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                tracing::debug!(target: "gateway.tls", peer = %peer, error = %e, "Connection closed with error");
            }
        });
    }

    connections.close();
    cancel_token.cancel();
    tracing::info!(
        target: "gateway.tls",
        open_connections = connections.len(),
        "Draining TLS connections"
    );
    connections.wait().await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_load_server_config_from_pem() {
        let config = load_server_config(&fixture("server.crt"), &fixture("server.key")).unwrap();
        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }

    #[test]
    fn test_missing_certificate_file() {
        let result = load_server_config(&fixture("missing.crt"), &fixture("server.key"));
        assert!(matches!(result, Err(TlsError::Certificates { .. })));
    }

    #[test]
    fn test_missing_key_file() {
        let result = load_server_config(&fixture("server.crt"), &fixture("missing.key"));
        assert!(matches!(result, Err(TlsError::PrivateKey { .. })));
    }

    #[test]
    fn test_key_file_without_certificates() {
        let result = load_server_config(&fixture("server.key"), &fixture("server.key"));
        assert!(matches!(result, Err(TlsError::NoCertificates(_))));
    }
}
