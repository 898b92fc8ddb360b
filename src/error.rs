//! Error types for the resource cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for fetches, mutations and cache access.
///
/// Errors are stored inside cache entries and shared between every subscriber
/// of a key, so the type is `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Transport unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success response carrying a server message
    #[error("Server error ({code}): {message}")]
    Server { code: i32, message: String },

    /// Caller supplied malformed parameters; raised before any fetch is issued
    #[error("Validation error: {0}")]
    Validation(String),

    /// A key was read back as a different type than the one stored under it
    #[error("Type mismatch for key {0}")]
    TypeMismatch(String),
}

impl CacheError {
    /// Shorthand for a server error built from an envelope.
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        CacheError::Server {
            code,
            message: message.into(),
        }
    }

    /// Whether a controller-level retry policy may re-issue the request.
    ///
    /// Only transport and server failures are retried; validation and type
    /// errors would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Network(_) | CacheError::Server { .. })
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Validation(_) => StatusCode::BAD_REQUEST,
            CacheError::Network(_) | CacheError::Server { .. } => StatusCode::BAD_GATEWAY,
            CacheError::TypeMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the resource cache.
pub type Result<T> = std::result::Result<T, CacheError>;
