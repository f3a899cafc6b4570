//! Builder patterns for test token claims
//!
//! Defaults produce claims the test gateway accepts: the test issuer and
//! audience, expiring one hour from now.

use crate::server_harness::{TEST_AUDIENCE, TEST_ISSUER};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .audience("svc-b")
///     .expires_in(60)
///     .build();
/// ```
pub struct TestTokenBuilder {
    iss: Option<Value>,
    aud: Option<Value>,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: i64,
    sub: Option<String>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            iss: Some(Value::String(TEST_ISSUER.to_string())),
            aud: Some(Value::String(TEST_AUDIENCE.to_string())),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            nbf: None,
            iat: now.timestamp(),
            sub: Some("test-subject".to_string()),
            extra: Map::new(),
        }
    }

    pub fn issuer(mut self, iss: &str) -> Self {
        self.iss = Some(Value::String(iss.to_string()));
        self
    }

    pub fn audience(mut self, aud: &str) -> Self {
        self.aud = Some(Value::String(aud.to_string()));
        self
    }

    /// Set `aud` to an arbitrary JSON value (e.g. an array).
    pub fn audience_value(mut self, aud: Value) -> Self {
        self.aud = Some(aud);
        self
    }

    pub fn without_issuer(mut self) -> Self {
        self.iss = None;
        self
    }

    pub fn without_audience(mut self) -> Self {
        self.aud = None;
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    pub fn without_expiration(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    pub fn subject(mut self, sub: &str) -> Self {
        self.sub = Some(sub.to_string());
        self
    }

    /// Add an arbitrary extra claim
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(iss) = self.iss {
            claims.insert("iss".to_string(), iss);
        }
        if let Some(aud) = self.aud {
            claims.insert("aud".to_string(), aud);
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        Value::Object(claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
