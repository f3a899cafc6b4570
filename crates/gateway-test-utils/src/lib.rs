//! # Gateway Test Utilities
//!
//! Shared test utilities for the Auth Gateway.
//!
//! This crate provides:
//! - Deterministic Ed25519 signing keys and JWKS documents (`crypto_fixtures`)
//! - A claims builder with gateway-compatible defaults (`token_builders`)
//! - A server harness running the gateway against a mock JWKS endpoint
//!   (`TestGatewayServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let key = TestSigningKey::new(1, "key-1")?;
//!     let server = TestGatewayServer::spawn(&[&key]).await?;
//!     let token = key.sign(&TestTokenBuilder::new().build());
//!
//!     let response = reqwest::Client::new()
//!         .get(server.endpoint_url())
//!         .header(TEST_PRESENCE_HEADER, "1")
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
