//! Error types for the process cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the process cache and its debug API.
///
/// Only construction can fail. Overload, invalid events and lookup misses
/// are reported through counters and `Option`, never through this type.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A configuration value cannot be used to build the cache
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The cache was constructed outside of a tokio runtime
    #[error("No tokio runtime available to spawn background tasks")]
    NoRuntime,

    /// The telemetry collector could not be registered
    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    /// No process matched a debug lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data on the debug API
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidConfig(_) | CacheError::NoRuntime | CacheError::Metrics(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the process cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = CacheError::NotFound("pid 7".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let response = CacheError::InvalidRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_construction_errors_display() {
        let err = CacheError::InvalidConfig("capacity must be greater than zero".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: capacity must be greater than zero"
        );
        assert!(CacheError::NoRuntime.to_string().contains("tokio runtime"));
    }
}
