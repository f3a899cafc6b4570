//! Auth Gateway response models.

use serde::{Deserialize, Serialize};

/// Message returned with 200 OK.
pub const AUTHORIZED_MESSAGE: &str = "Authorization successful";

/// Message returned with 401 Unauthorized.
pub const NOT_AUTHORIZED_MESSAGE: &str = "Not authorized";

/// Message returned with 404 Not Found.
pub const NOT_FOUND_MESSAGE: &str = "Not found";

/// JSON body of every gateway response: `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
}

impl AuthResponse {
    pub fn authorized() -> Self {
        Self {
            message: AUTHORIZED_MESSAGE.to_string(),
        }
    }

    pub fn not_authorized() -> Self {
        Self {
            message: NOT_AUTHORIZED_MESSAGE.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            message: NOT_FOUND_MESSAGE.to_string(),
        }
    }
}
