//! Request DTOs for the devtools API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::CacheKey;
use crate::error::Result;

/// Request body for prefix invalidation (POST /invalidate)
///
/// # Fields
/// - `prefix`: key prefix in JSON array form, e.g. `["categories"]`
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub prefix: Vec<Value>,
}

impl InvalidateRequest {
    /// Parses the prefix into a cache key.
    pub fn key(&self) -> Result<CacheKey> {
        CacheKey::from_json(Value::Array(self.prefix.clone()))
    }
}
