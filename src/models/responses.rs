//! Response DTOs for the devtools API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, EntryInfo};

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Share of accesses answered from the cache
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the entry listing (GET /entries)
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub entries: Vec<EntryInfo>,
}

impl EntriesResponse {
    pub fn new(entries: Vec<EntryInfo>) -> Self {
        Self {
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for prefix invalidation (POST /invalidate)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub matched: usize,
}

impl InvalidateResponse {
    pub fn new(prefix: impl std::fmt::Display, matched: usize) -> Self {
        Self {
            message: format!("Invalidated {} entries under {}", matched, prefix),
            matched,
        }
    }
}

/// Response body for manual sweeps (POST /gc) and full clears (DELETE /entries)
#[derive(Debug, Clone, Serialize)]
pub struct RemovedResponse {
    pub message: String,
    pub removed: usize,
}

impl RemovedResponse {
    pub fn evicted(removed: usize) -> Self {
        Self {
            message: format!("Evicted {} idle entries", removed),
            removed,
        }
    }

    pub fn cleared(removed: usize) -> Self {
        Self {
            message: format!("Cleared {} entries", removed),
            removed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
