//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer`, which runs a real gateway against a wiremock
//! JWKS endpoint.

use crate::crypto_fixtures::{jwks_json, TestSigningKey};
use auth_gateway::auth::{HttpKeySetSource, KeySetProvider};
use auth_gateway::config::Config;
use auth_gateway::routes::{self, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Issuer the test gateway expects.
pub const TEST_ISSUER: &str = "https://idp.example";

/// Audience the test gateway expects.
pub const TEST_AUDIENCE: &str = "svc-a";

/// Presence header that selects the JWT path.
pub const TEST_PRESENCE_HEADER: &str = "x-use-jwt";

/// Configured Basic username.
pub const TEST_BASIC_USERNAME: &str = "ops";

/// Configured Basic password.
pub const TEST_BASIC_PASSWORD: &str = "s3cret";

/// Exact-match endpoint.
pub const TEST_ENDPOINT: &str = "/auth";

/// Subtree endpoint.
pub const TEST_SUBTREE_ENDPOINT: &str = "/verify/";

/// Path the mock JWKS is served on.
pub const TEST_JWKS_PATH: &str = "/.well-known/jwks.json";

/// Settings file contents for a test gateway using `jwks_url`.
pub fn test_settings(jwks_url: &str) -> Value {
    json!({
        "issuer": TEST_ISSUER,
        "audience": TEST_AUDIENCE,
        "jwksUrl": jwks_url,
        "authHeaderName": TEST_PRESENCE_HEADER,
        "basicAuthUsername": TEST_BASIC_USERNAME,
        "basicAuthPassword": TEST_BASIC_PASSWORD,
        "port": "127.0.0.1:0",
        "endpoints": [TEST_ENDPOINT, TEST_SUBTREE_ENDPOINT]
    })
}

/// Serve `jwks` on [`TEST_JWKS_PATH`], replacing whatever was mounted.
pub async fn mount_jwks(server: &MockServer, jwks: Value) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(TEST_JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
        .mount(server)
        .await;
}

/// Test harness for spawning the Auth Gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let key = TestSigningKey::new(1, "key-1")?;
/// let server = TestGatewayServer::spawn(&[&key]).await?;
///
/// let response = reqwest::Client::new()
///     .get(server.endpoint_url())
///     .basic_auth(TEST_BASIC_USERNAME, Some(TEST_BASIC_PASSWORD))
///     .send()
///     .await?;
///
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    jwks_server: MockServer,
    config: Arc<Config>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a gateway with default settings whose JWKS lists `keys`.
    pub async fn spawn(keys: &[&TestSigningKey]) -> Result<Self, anyhow::Error> {
        Self::spawn_with_settings(keys, json!({})).await
    }

    /// Spawn a gateway with `overrides` merged into the default settings.
    ///
    /// The server will:
    /// - Serve `keys` from a wiremock JWKS endpoint
    /// - Fetch the key set once before accepting traffic
    /// - Bind to a random available port (127.0.0.1:0)
    pub async fn spawn_with_settings(
        keys: &[&TestSigningKey],
        overrides: Value,
    ) -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        mount_jwks(&jwks_server, jwks_json(keys)).await;

        let mut settings = test_settings(&format!("{}{}", jwks_server.uri(), TEST_JWKS_PATH));
        if let (Some(settings), Some(overrides)) = (settings.as_object_mut(), overrides.as_object())
        {
            for (key, value) in overrides {
                settings.insert(key.clone(), value.clone());
            }
        }

        let config = Config::from_json_str(&settings.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let source = HttpKeySetSource::new(config.jwks_url.clone(), config.jwks_fetch_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to create key source: {}", e))?;
        let key_set = Arc::new(KeySetProvider::new(Arc::new(source), config.key_set_policy));
        key_set
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch JWKS: {}", e))?;

        let listener = tokio::net::TcpListener::bind(config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let config = Arc::new(config);
        let state = Arc::new(AppState::new(&config, key_set));
        let app = routes::build_routes(state);

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            jwks_server,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the exact-match endpoint.
    pub fn endpoint_url(&self) -> String {
        format!("{}{}", self.url(), TEST_ENDPOINT)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publish a different key set.
    pub async fn set_jwks(&self, keys: &[&TestSigningKey]) {
        mount_jwks(&self.jwks_server, jwks_json(keys)).await;
    }

    /// Make the JWKS endpoint answer every request with `status`.
    pub async fn fail_jwks(&self, status: u16) {
        self.jwks_server.reset().await;
        Mock::given(method("GET"))
            .and(path(TEST_JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.jwks_server)
            .await;
    }

    /// Number of JWKS fetches the gateway has made since the last reset.
    pub async fn jwks_fetch_count(&self) -> usize {
        self.jwks_server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Explicitly abort the HTTP server task to ensure immediate cleanup
        // when the test completes.
        self._handle.abort();
    }
}
