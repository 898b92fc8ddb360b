//! API Handlers
//!
//! HTTP request handlers for each devtools endpoint.

use axum::{extract::State, Json};

use crate::cache::ResourceCache;
use crate::error::Result;
use crate::models::{
    EntriesResponse, HealthResponse, InvalidateRequest, InvalidateResponse, RemovedResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache is a cheap handle; clones share the same entries.
#[derive(Clone, Default)]
pub struct AppState {
    pub cache: ResourceCache,
}

impl AppState {
    pub fn new(cache: ResourceCache) -> Self {
        Self { cache }
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats()))
}

/// Handler for GET /entries
pub async fn entries_handler(State(state): State<AppState>) -> Json<EntriesResponse> {
    Json(EntriesResponse::new(state.cache.entries()))
}

/// Handler for POST /invalidate
///
/// Marks every entry under the given prefix stale. Subscribed entries refetch
/// in the background; the response does not wait for them.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let prefix = req.key()?;
    let matched = state.cache.invalidate(&prefix);
    Ok(Json(InvalidateResponse::new(prefix, matched)))
}

/// Handler for POST /gc
pub async fn gc_handler(State(state): State<AppState>) -> Json<RemovedResponse> {
    Json(RemovedResponse::evicted(state.cache.garbage_collect()))
}

/// Handler for DELETE /entries
pub async fn clear_handler(State(state): State<AppState>) -> Json<RemovedResponse> {
    Json(RemovedResponse::cleared(state.cache.clear()))
}
