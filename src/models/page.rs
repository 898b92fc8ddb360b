//! Paginated search models

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Parameter object of a paginated search request.
///
/// Serialized into the cache key, so `(search, page, limit)` identifies a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub search: String,
    pub page: u32,
    pub limit: u32,
}

impl SearchParams {
    pub fn new(search: impl Into<String>, page: u32, limit: u32) -> Self {
        Self {
            search: search.into(),
            page,
            limit,
        }
    }

    /// Rejects page or limit values the backend cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(CacheError::Validation("page must be at least 1".to_string()));
        }
        if self.limit == 0 {
            return Err(CacheError::Validation("limit must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_next_page: bool) -> Self {
        Self {
            items,
            has_next_page,
            total: None,
        }
    }
}
