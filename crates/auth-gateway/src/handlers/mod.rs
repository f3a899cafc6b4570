//! HTTP request handlers for the Auth Gateway.

pub mod authorize;

pub use authorize::authorize;
