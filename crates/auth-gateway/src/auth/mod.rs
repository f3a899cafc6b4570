//! Request authorization.
//!
//! - `jwks` - signing key set acquisition and caching
//! - `claims` - token claims and issuer/audience checks
//! - `jwt` - bearer token verification
//! - `basic` - HTTP Basic credential verification
//! - `decision` - path selection and verdicts

pub mod basic;
pub mod claims;
pub mod decision;
pub mod jwks;
pub mod jwt;

pub use decision::{AuthDecision, AuthPath, AuthVerdict};
pub use jwks::{HttpKeySetSource, KeySetPolicy, KeySetProvider};
