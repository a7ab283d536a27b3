//! Common API response wrapper types.
//!
//! [`ApiResponse`] is the standard envelope for successful responses: the
//! payload's fields are flattened next to `success: true`, so clients check
//! one flag whether the call succeeded or not.

use serde::Serialize;

/// Standard API response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Always `true` for successful responses.
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data,
        }
    }
}
