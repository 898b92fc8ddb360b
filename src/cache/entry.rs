//! Cache Entry Module
//!
//! Defines one cached fetch result together with its timing metadata,
//! subscriber count and in-flight bookkeeping.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::CacheKey;
use crate::error::{CacheError, Result};

/// Type-erased cached value. Typed handles downcast on read.
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

pub(crate) type ErasedFuture = Pin<Box<dyn Future<Output = Result<ErasedValue>> + Send>>;

/// Last fetch function registered for a key, kept so invalidation can refetch.
pub(crate) type Fetcher = Arc<dyn Fn() -> ErasedFuture + Send + Sync>;

// == Query Status ==
/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

// == Fetch Options ==
/// Timing parameters supplied with each fetch-or-reuse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Age below which a successful entry is reused without refetch
    pub stale_time: Duration,
    /// Idle window after which an unsubscribed entry is evicted
    pub gc_time: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(300),
        }
    }
}

impl FetchOptions {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }
}

// == Cache Entry ==
/// Represents a single cache entry. Only the cache mutates it.
pub struct CacheEntry {
    key: CacheKey,
    pub(super) status: QueryStatus,
    pub(super) value: Option<ErasedValue>,
    pub(super) error: Option<CacheError>,
    pub(super) fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
    pub(super) stale_time: Duration,
    pub(super) gc_time: Duration,
    pub(super) subscriber_count: usize,
    /// Id of the single outstanding fetch, if any
    pub(super) in_flight: Option<u64>,
    /// Set when an invalidation arrives while a fetch is already in flight
    pub(super) refetch_after: bool,
    pub(super) invalidated: bool,
    pub(super) gc_deadline: Option<Instant>,
    pub(super) fetcher: Option<Fetcher>,
    notify: watch::Sender<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an idle entry with no subscribers; its GC deadline is armed at once.
    pub(super) fn new(key: CacheKey, options: FetchOptions, now: Instant) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            key,
            status: QueryStatus::Idle,
            value: None,
            error: None,
            fetched_at: None,
            updated_at: None,
            stale_time: options.stale_time,
            gc_time: options.gc_time,
            subscriber_count: 0,
            in_flight: None,
            refetch_after: false,
            invalidated: false,
            gc_deadline: Some(now + options.gc_time),
            fetcher: None,
            notify,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    // == Freshness ==
    /// A successful, non-invalidated entry younger than `stale_time` is fresh.
    ///
    /// Boundary condition: an entry whose age equals `stale_time` is stale.
    pub fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        self.status == QueryStatus::Success
            && !self.invalidated
            && self
                .fetched_at
                .is_some_and(|at| now.duration_since(at) < stale_time)
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        !self.is_fresh(now, self.stale_time)
    }

    /// True once the GC deadline has elapsed with nobody subscribed and no
    /// fetch in flight.
    pub fn is_gc_expired(&self, now: Instant) -> bool {
        self.subscriber_count == 0
            && self.in_flight.is_none()
            && self.gc_deadline.is_some_and(|deadline| now >= deadline)
    }

    // == State Transitions ==
    pub(super) fn mark_loading(&mut self, fetch_id: u64) {
        self.in_flight = Some(fetch_id);
        if self.value.is_none() {
            self.status = QueryStatus::Loading;
            self.error = None;
        }
        self.bump();
    }

    pub(super) fn apply_success(&mut self, value: ErasedValue, now: Instant) {
        self.status = QueryStatus::Success;
        self.value = Some(value);
        self.error = None;
        self.fetched_at = Some(now);
        self.updated_at = Some(Utc::now());
    }

    /// Records a failure. The previous value is kept as last-known-good data.
    pub(super) fn apply_failure(&mut self, error: CacheError) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
        self.updated_at = Some(Utc::now());
    }

    pub(super) fn add_subscriber(&mut self) {
        self.subscriber_count += 1;
        self.gc_deadline = None;
    }

    pub(super) fn remove_subscriber(&mut self, now: Instant) {
        self.subscriber_count = self.subscriber_count.saturating_sub(1);
        if self.subscriber_count == 0 {
            self.gc_deadline = Some(now + self.gc_time);
        }
    }

    /// Wakes every handle watching this entry.
    pub(super) fn bump(&self) {
        self.notify.send_modify(|version| *version = version.wrapping_add(1));
    }

    pub(super) fn watch(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    // == Snapshots ==
    /// Typed view of the entry. Fails if the stored value is not a `T`.
    pub(super) fn snapshot<T: Send + Sync + 'static>(&self, now: Instant) -> Result<EntrySnapshot<T>> {
        let data = match &self.value {
            Some(value) => Some(
                Arc::clone(value)
                    .downcast::<T>()
                    .map_err(|_| CacheError::TypeMismatch(self.key.to_string()))?,
            ),
            None => None,
        };
        Ok(EntrySnapshot {
            key: self.key.clone(),
            status: self.status,
            data,
            error: self.error.clone(),
            is_fetching: self.is_fetching(),
            is_stale: self.is_stale(now),
            fetched_at: self.fetched_at,
            updated_at: self.updated_at,
        })
    }

    pub(super) fn info(&self, now: Instant) -> EntryInfo {
        EntryInfo {
            key: self.key.to_string(),
            status: self.status,
            subscriber_count: self.subscriber_count,
            is_fetching: self.is_fetching(),
            is_stale: self.is_stale(now),
            invalidated: self.invalidated,
            has_value: self.value.is_some(),
            error: self.error.as_ref().map(ToString::to_string),
            age_ms: self
                .fetched_at
                .map(|at| now.duration_since(at).as_millis() as u64),
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("status", &self.status)
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("subscriber_count", &self.subscriber_count)
            .field("in_flight", &self.in_flight)
            .field("invalidated", &self.invalidated)
            .finish()
    }
}

// == Entry Snapshot ==
/// Point-in-time typed view of an entry as exposed to controllers.
#[derive(Debug)]
pub struct EntrySnapshot<T> {
    pub key: CacheKey,
    pub status: QueryStatus,
    /// Last successful value; still present after a failed refetch
    pub data: Option<Arc<T>>,
    pub error: Option<CacheError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub fetched_at: Option<Instant>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> EntrySnapshot<T> {
    /// Snapshot of a key with no entry behind it.
    pub(crate) fn idle(key: CacheKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            fetched_at: None,
            updated_at: None,
        }
    }
}

impl<T> Clone for EntrySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            fetched_at: self.fetched_at,
            updated_at: self.updated_at,
        }
    }
}

// == Entry Info ==
/// Untyped summary of an entry for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub status: QueryStatus,
    pub subscriber_count: usize,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub invalidated: bool,
    pub has_value: bool,
    pub error: Option<String>,
    pub age_ms: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(now: Instant) -> CacheEntry {
        CacheEntry::new(
            CacheKey::new("cat"),
            FetchOptions::default()
                .stale_time(Duration::from_secs(60))
                .gc_time(Duration::from_secs(300)),
            now,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_entry_is_idle_and_stale() {
        let now = Instant::now();
        let entry = entry(now);

        assert_eq!(entry.status(), QueryStatus::Idle);
        assert!(entry.is_stale(now));
        assert!(!entry.is_fetching());
        assert_eq!(entry.gc_deadline, Some(now + Duration::from_secs(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_boundary() {
        let now = Instant::now();
        let mut entry = entry(now);
        entry.apply_success(Arc::new(vec![1u32, 2, 3]), now);

        let window = Duration::from_secs(60);
        assert!(entry.is_fresh(now + Duration::from_secs(59), window));
        // Stale once the full window has elapsed
        assert!(!entry.is_fresh(now + window, window));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_value() {
        let now = Instant::now();
        let mut entry = entry(now);
        entry.apply_success(Arc::new("good".to_string()), now);
        entry.apply_failure(CacheError::Network("unreachable".into()));

        let snapshot = entry.snapshot::<String>(now).unwrap();
        assert_eq!(snapshot.status, QueryStatus::Error);
        assert_eq!(snapshot.data.as_deref().map(String::as_str), Some("good"));
        assert!(snapshot.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_error() {
        let now = Instant::now();
        let mut entry = entry(now);
        entry.apply_failure(CacheError::Network("unreachable".into()));
        entry.apply_success(Arc::new(1u8), now);

        assert_eq!(entry.status(), QueryStatus::Success);
        assert!(entry.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_type_mismatch() {
        let now = Instant::now();
        let mut entry = entry(now);
        entry.apply_success(Arc::new(42u64), now);

        let result = entry.snapshot::<String>(now);
        assert!(matches!(result, Err(CacheError::TypeMismatch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_gc_deadline() {
        let now = Instant::now();
        let mut entry = entry(now);

        entry.add_subscriber();
        assert!(entry.gc_deadline.is_none());
        assert!(!entry.is_gc_expired(now + Duration::from_secs(1000)));

        entry.remove_subscriber(now);
        assert!(!entry.is_gc_expired(now + Duration::from_secs(299)));
        assert!(entry.is_gc_expired(now + Duration::from_secs(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_entry_never_gc_expired() {
        let now = Instant::now();
        let mut entry = entry(now);

        entry.mark_loading(1);
        assert!(!entry.is_gc_expired(now + Duration::from_secs(1000)));

        entry.in_flight = None;
        assert!(entry.is_gc_expired(now + Duration::from_secs(300)));
    }
}
