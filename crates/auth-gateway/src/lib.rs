//! Auth Gateway Library
//!
//! A small HTTP authorization gateway. Each request on a configured endpoint
//! is answered 200 or 401 after one of two checks:
//!
//! - Bearer JWT verified against a remote JWKS, plus issuer/audience claims
//!   (selected when the configured presence header is set)
//! - HTTP Basic credentials against a configured username/password
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/authorize.rs -> auth/decision.rs -> auth/{jwt,basic}.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key set provider, verifiers and decision logic
//! - `config` - Configuration from the JSON settings file
//! - `errors` - Reject reasons and the HTTP error mapping
//! - `handlers` - HTTP request handlers
//! - `models` - Response bodies
//! - `routes` - Axum router setup
//! - `tls` - TLS listener

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod tls;
