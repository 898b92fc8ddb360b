//! Query configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::FetchOptions;

/// Upper bound for a single retry backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

type Selector<T, S> = Arc<dyn Fn(&Arc<T>) -> S + Send + Sync>;

// == Query Config ==
/// Per-query options.
///
/// `S` is what the controller exposes after `select`; without a projection it
/// is the shared cached value itself.
pub struct QueryConfig<T, S = Arc<T>> {
    /// Freshness and eviction windows forwarded to the cache
    pub fetch: FetchOptions,
    /// When false nothing is fetched and the controller reports `Idle`
    pub enabled: bool,
    /// Retries after a retryable failure before settling in `Error`
    pub retry_count: u32,
    /// Base backoff, doubled on each attempt
    pub retry_delay: Duration,
    select: Selector<T, S>,
}

impl<T: Send + Sync + 'static> QueryConfig<T> {
    pub fn new() -> Self {
        Self {
            fetch: FetchOptions::default(),
            enabled: true,
            retry_count: 0,
            retry_delay: Duration::from_secs(1),
            select: Arc::new(|value: &Arc<T>| Arc::clone(value)),
        }
    }
}

impl<T: Send + Sync + 'static> Default for QueryConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> QueryConfig<T, S> {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.fetch.stale_time = stale_time;
        self
    }

    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.fetch.gc_time = gc_time;
        self
    }

    pub fn fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    /// Replaces the projection applied to successful values on every read.
    ///
    /// The projection receives the shared cached value and must not mutate
    /// anything; it is re-run on each `result()` call.
    pub fn select<S2, F>(self, select: F) -> QueryConfig<T, S2>
    where
        F: Fn(&Arc<T>) -> S2 + Send + Sync + 'static,
    {
        QueryConfig {
            fetch: self.fetch,
            enabled: self.enabled,
            retry_count: self.retry_count,
            retry_delay: self.retry_delay,
            select: Arc::new(select),
        }
    }

    pub(crate) fn project(&self, value: &Arc<T>) -> S {
        (self.select)(value)
    }
}

/// `base * 2^attempt`, capped at [`MAX_RETRY_DELAY`].
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

impl<T, S> Clone for QueryConfig<T, S> {
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch,
            enabled: self.enabled,
            retry_count: self.retry_count,
            retry_delay: self.retry_delay,
            select: Arc::clone(&self.select),
        }
    }
}

impl<T, S> fmt::Debug for QueryConfig<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("fetch", &self.fetch)
            .field("enabled", &self.enabled)
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
