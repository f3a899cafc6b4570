//! Auth Gateway configuration.
//!
//! Configuration is a JSON file (`appsettings.json` by default, overridden by
//! `GATEWAY_CONFIG_PATH`) with camelCase keys. Unknown keys are rejected. The
//! Basic password is redacted in Debug output.

use crate::auth::decision::JWT_VERIFY_TIMEOUT;
use crate::auth::jwks::{KeySetPolicy, DEFAULT_FETCH_TIMEOUT};
use axum::http::HeaderName;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG_PATH";

/// Config file used when `GATEWAY_CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "appsettings.json";

/// Default listen address, in `:port` form.
pub const DEFAULT_PORT: &str = ":8080";

/// Default TLS certificate chain (PEM).
pub const DEFAULT_TLS_CERT_PATH: &str = "server.crt";

/// Default TLS private key (PEM).
pub const DEFAULT_TLS_KEY_PATH: &str = "server.key";

/// Certificate and key files for the TLS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Auth Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// JWKS document URL (http or https).
    pub jwks_url: String,

    /// Header whose non-empty presence selects the JWT path.
    pub presence_header: HeaderName,

    /// Basic auth username.
    pub basic_username: String,

    /// Basic auth password - redacted in Debug output.
    pub basic_password: SecretString,

    /// Listen address.
    pub bind_address: SocketAddr,

    /// Paths the authorize handler is mounted on. A trailing `/` mounts the
    /// whole subtree.
    pub endpoints: Vec<String>,

    /// TLS files, when TLS is enabled.
    pub tls: Option<TlsConfig>,

    /// Key set freshness policy.
    pub key_set_policy: KeySetPolicy,

    /// Timeout for a single JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Clock skew tolerance for `exp` and `nbf`.
    pub jwt_clock_skew: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("jwks_url", &self.jwks_url)
            .field("presence_header", &self.presence_header)
            .field("basic_username", &self.basic_username)
            .field("basic_password", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("endpoints", &self.endpoints)
            .field("tls", &self.tls)
            .field("key_set_policy", &self.key_set_policy)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required config value: {0}")]
    MissingValue(&'static str),

    #[error("Invalid jwksUrl: {0}")]
    InvalidJwksUrl(String),

    #[error("Invalid authHeaderName: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid port: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS fetch timeout: {0}")]
    InvalidFetchTimeout(String),
}

/// On-disk shape of the config file.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    issuer: Option<String>,
    audience: Option<String>,
    jwks_url: Option<String>,
    auth_header_name: Option<String>,
    basic_auth_username: Option<String>,
    basic_auth_password: Option<SecretString>,
    port: Option<String>,
    endpoints: Option<Vec<String>>,
    #[serde(default)]
    enable_tls: bool,
    tls_cert_path: Option<PathBuf>,
    tls_key_path: Option<PathBuf>,
    jwks_refresh_interval_seconds: Option<u64>,
    jwks_fetch_timeout_seconds: Option<u64>,
    jwt_clock_skew_seconds: Option<u64>,
}

impl Config {
    /// Load configuration from the file named by `GATEWAY_CONFIG_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_file(Self::config_path(&env::vars().collect()))
    }

    /// Resolve the config file path from environment variables (for testing).
    pub fn config_path(vars: &HashMap<String, String>) -> PathBuf {
        vars.get(CONFIG_PATH_ENV)
            .filter(|path| !path.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;

        let issuer = required(raw.issuer, "issuer")?;
        let audience = required(raw.audience, "audience")?;
        let jwks_url = parse_jwks_url(required(raw.jwks_url, "jwksUrl")?)?;

        let header_name = required(raw.auth_header_name, "authHeaderName")?;
        let presence_header = HeaderName::from_bytes(header_name.as_bytes()).map_err(|e| {
            ConfigError::InvalidHeaderName(format!("'{}' is not a valid header name: {}", header_name, e))
        })?;

        let basic_username = required(raw.basic_auth_username, "basicAuthUsername")?;
        let basic_password = raw
            .basic_auth_password
            .filter(|password| !password.expose_secret().is_empty())
            .ok_or(ConfigError::MissingValue("basicAuthPassword"))?;

        let bind_address = parse_bind_address(raw.port.as_deref().unwrap_or(DEFAULT_PORT))?;

        let endpoints = raw
            .endpoints
            .ok_or(ConfigError::MissingValue("endpoints"))?;
        validate_endpoints(&endpoints)?;

        let tls = raw.enable_tls.then(|| TlsConfig {
            cert_path: raw
                .tls_cert_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TLS_CERT_PATH)),
            key_path: raw
                .tls_key_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TLS_KEY_PATH)),
        });

        let key_set_policy = KeySetPolicy::from_refresh_interval(raw.jwks_refresh_interval_seconds);

        let jwks_fetch_timeout = match raw.jwks_fetch_timeout_seconds {
            Some(0) => {
                return Err(ConfigError::InvalidFetchTimeout(
                    "jwksFetchTimeoutSeconds must be greater than 0".to_string(),
                ));
            }
            Some(secs) if secs >= JWT_VERIFY_TIMEOUT.as_secs() => {
                return Err(ConfigError::InvalidFetchTimeout(format!(
                    "jwksFetchTimeoutSeconds must be less than {} seconds, got {}",
                    JWT_VERIFY_TIMEOUT.as_secs(),
                    secs
                )));
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_FETCH_TIMEOUT,
        };

        let jwt_clock_skew = match raw.jwt_clock_skew_seconds {
            Some(secs) if secs > MAX_CLOCK_SKEW.as_secs() => {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "jwtClockSkewSeconds must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    secs
                )));
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_CLOCK_SKEW,
        };

        Ok(Config {
            issuer,
            audience,
            jwks_url,
            presence_header,
            basic_username,
            basic_password,
            bind_address,
            endpoints,
            tls,
            key_set_policy,
            jwks_fetch_timeout,
            jwt_clock_skew,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingValue(key))
}

fn parse_jwks_url(url: String) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(&url)
        .map_err(|e| ConfigError::InvalidJwksUrl(format!("'{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidJwksUrl(format!(
            "'{}': scheme must be http or https, got {}",
            url, other
        ))),
    }
}

/// `":8080"` listens on all interfaces; `"host:port"` must be an IP socket
/// address.
fn parse_bind_address(port: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = if port.starts_with(':') {
        format!("0.0.0.0{}", port)
    } else {
        port.to_string()
    };
    candidate
        .parse()
        .map_err(|e| ConfigError::InvalidBindAddress(format!("'{}': {}", port, e)))
}

fn validate_endpoints(endpoints: &[String]) -> Result<(), ConfigError> {
    if endpoints.is_empty() {
        return Err(ConfigError::InvalidEndpoint(
            "endpoints must contain at least one path".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for endpoint in endpoints {
        if !endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint(format!(
                "'{}' must start with '/'",
                endpoint
            )));
        }
        if endpoint.contains(['*', ':', '{', '}']) {
            return Err(ConfigError::InvalidEndpoint(format!(
                "'{}' must not contain route parameters or wildcards",
                endpoint
            )));
        }
        if !seen.insert(endpoint.as_str()) {
            return Err(ConfigError::InvalidEndpoint(format!(
                "'{}' is listed more than once",
                endpoint
            )));
        }
    }
    Ok(())
}
