//! Utilities shared across the auth gateway crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT pre-parse utilities (bearer prefix, size limit, key ID)
pub mod jwt;
