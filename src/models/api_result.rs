//! Transport envelope
//!
//! Every backend call answers with the same `{success, code, response, message}`
//! envelope. Fetch functions convert it into a `Result` before handing it to
//! the cache.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Response envelope returned by the backend API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResult<T> {
    pub fn ok(response: T) -> Self {
        Self {
            success: true,
            code: 200,
            response: Some(response),
            message: None,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            response: None,
            message: Some(message.into()),
        }
    }

    /// Collapses the envelope into a `Result`.
    ///
    /// `success == false` and a successful envelope without a body are both
    /// reported as `Server` errors carrying the envelope's code and message.
    pub fn into_result(self) -> Result<T> {
        match (self.success, self.response) {
            (true, Some(response)) => Ok(response),
            (true, None) => Err(CacheError::server(
                self.code,
                self.message.unwrap_or_else(|| "empty response".to_string()),
            )),
            (false, _) => Err(CacheError::server(
                self.code,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            )),
        }
    }
}
