//! Configuration Module
//!
//! Handles loading cache defaults and devtools server settings from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::FetchOptions;
use crate::query::QueryConfig;
use crate::search::SearchOptions;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default age in milliseconds below which an entry is reused without refetch
    pub default_stale_time_ms: u64,
    /// Default idle window in milliseconds before an unsubscribed entry is evicted
    pub default_gc_time_ms: u64,
    /// Default number of controller-level retries for failed queries
    pub default_retry_count: u32,
    /// Base backoff delay in milliseconds between retries
    pub retry_delay_ms: u64,
    /// Default page size for paginated search
    pub default_page_size: u32,
    /// Background garbage collection interval in seconds
    pub gc_interval: u64,
    /// Devtools HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_STALE_TIME_MS` - Freshness window (default: 0)
    /// - `DEFAULT_GC_TIME_MS` - Eviction window (default: 300000)
    /// - `DEFAULT_RETRY_COUNT` - Query retries (default: 3)
    /// - `RETRY_DELAY_MS` - Base retry backoff (default: 1000)
    /// - `DEFAULT_PAGE_SIZE` - Search page size (default: 20)
    /// - `GC_INTERVAL_SECS` - GC sweep frequency in seconds (default: 1)
    /// - `SERVER_PORT` - Devtools HTTP port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_stale_time_ms: env_or("DEFAULT_STALE_TIME_MS", defaults.default_stale_time_ms),
            default_gc_time_ms: env_or("DEFAULT_GC_TIME_MS", defaults.default_gc_time_ms),
            default_retry_count: env_or("DEFAULT_RETRY_COUNT", defaults.default_retry_count),
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms),
            default_page_size: env_or("DEFAULT_PAGE_SIZE", defaults.default_page_size),
            gc_interval: env_or("GC_INTERVAL_SECS", defaults.gc_interval),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Cache-level timing defaults derived from this configuration.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            stale_time: Duration::from_millis(self.default_stale_time_ms),
            gc_time: Duration::from_millis(self.default_gc_time_ms),
        }
    }

    /// Query defaults (timings plus retry policy) without a projection.
    pub fn query_config<T: Send + Sync + 'static>(&self) -> QueryConfig<T> {
        QueryConfig::new()
            .fetch_options(self.fetch_options())
            .retry(
                self.default_retry_count,
                Duration::from_millis(self.retry_delay_ms),
            )
    }

    /// Paginated search defaults: configured page size plus [`Config::query_config`].
    pub fn search_options<T: Send + Sync + 'static>(&self) -> SearchOptions<T> {
        SearchOptions::new(self.default_page_size).query(self.query_config())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_stale_time_ms: 0,
            default_gc_time_ms: 300_000,
            default_retry_count: 3,
            retry_delay_ms: 1000,
            default_page_size: 20,
            gc_interval: 1,
            server_port: 3000,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
