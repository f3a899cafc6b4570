//! Secret types for values that must never reach the logs.
//!
//! Re-exports [`secrecy`] types. `SecretString` redacts itself in `Debug`, so a
//! config struct holding one can derive or hand-write `Debug` safely, and the
//! value is zeroized on drop. Reading the value requires an explicit
//! `expose_secret()` call, which keeps every use greppable.
//!
//! In the gateway this covers the configured Basic-auth password.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let password = SecretString::from("s3cret");
//! assert!(format!("{password:?}").contains("REDACTED"));
//! assert_eq!(password.expose_secret(), "s3cret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("s3cret");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("s3cret"));
    }

    #[test]
    fn test_deserialize_from_config_json() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct BasicCredentials {
            basic_auth_username: String,
            basic_auth_password: SecretString,
        }

        let json = r#"{"basicAuthUsername": "ops", "basicAuthPassword": "s3cret"}"#;
        let creds: BasicCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.basic_auth_password.expose_secret(), "s3cret");

        let debug = format!("{creds:?}");
        assert!(debug.contains("ops"));
        assert!(!debug.contains("s3cret"));
    }
}
