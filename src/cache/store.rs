//! Resource Cache Module
//!
//! Main cache engine: keyed entries with stale-while-revalidate reuse,
//! request de-duplication, prefix invalidation and idle garbage collection.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::entry::{ErasedFuture, ErasedValue, Fetcher};
use crate::cache::{
    CacheEntry, CacheKey, CacheStats, EntryHandle, EntryInfo, EntrySnapshot, FetchOptions,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    stats: CacheStats,
}

impl CacheState {
    /// Lazily evicts `key` if its GC deadline already passed.
    fn evict_if_expired(&mut self, key: &CacheKey, now: Instant) {
        if self.entries.get(key).is_some_and(|e| e.is_gc_expired(now)) {
            self.entries.remove(key);
            self.stats.record_eviction();
            debug!(%key, "evicted idle entry on access");
        }
    }

    fn sync_len(&mut self) {
        let len = self.entries.len();
        self.stats.set_total_entries(len);
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<CacheState>,
    fetch_ids: AtomicU64,
}

// == Resource Cache ==
/// Process-wide store of asynchronous fetch results.
///
/// Cloning is cheap and every clone addresses the same entries. Construct one
/// at startup and pass it to the controllers that need it. State is guarded by
/// a single mutex that is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    shared: Arc<Shared>,
}

impl ResourceCache {
    // == Constructor ==
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // == Fetch Or Reuse ==
    /// Returns a handle to the entry for `key`, fetching only when needed.
    ///
    /// - Fresh success: served as is, `fetch_fn` is not invoked.
    /// - Stale, invalidated or failed entry: the current value stays readable
    ///   and a background refetch starts.
    /// - Unknown key: a `Loading` entry is created and `fetch_fn` starts.
    ///
    /// A fetch already in flight for the key is joined instead of duplicated.
    /// Must be called from within a tokio runtime.
    pub fn fetch_or_reuse<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch_fn: F,
        options: FetchOptions,
    ) -> EntryHandle<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || -> ErasedFuture {
            let fut = fetch_fn();
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as ErasedValue) })
        });

        let now = Instant::now();
        let mut state = self.shared.state.lock();
        state.evict_if_expired(&key, now);

        let CacheState { entries, stats } = &mut *state;
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone(), options, now));
        entry.fetcher = Some(fetcher);
        entry.stale_time = options.stale_time;
        entry.gc_time = entry.gc_time.max(options.gc_time);
        let changes = entry.watch();

        if entry.is_fetching() {
            stats.record_dedup();
            debug!(%key, "joined in-flight fetch");
        } else if entry.is_fresh(now, options.stale_time) {
            stats.record_hit();
            debug!(%key, "served fresh entry");
        } else {
            if entry.value.is_some() {
                stats.record_stale_hit();
                debug!(%key, "serving stale entry while revalidating");
            } else {
                stats.record_miss();
            }
            stats.record_fetch();
            self.start_fetch(entry);
        }
        state.sync_len();

        EntryHandle::new(self.clone(), key, changes)
    }

    /// Starts a fetch for `key` regardless of freshness, reusing the last
    /// registered fetch function. Still de-duplicated.
    ///
    /// Returns true if a fetch is in flight for the key afterwards.
    pub fn refetch(&self, key: &CacheKey) -> bool {
        let mut state = self.shared.state.lock();
        let CacheState { entries, stats } = &mut *state;
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        if !entry.is_fetching() && entry.fetcher.is_some() {
            stats.record_fetch();
            self.start_fetch(entry);
        }
        entry.is_fetching()
    }

    fn start_fetch(&self, entry: &mut CacheEntry) {
        let Some(fetcher) = entry.fetcher.clone() else {
            return;
        };
        let fetch_id = self.shared.fetch_ids.fetch_add(1, Ordering::Relaxed) + 1;
        entry.mark_loading(fetch_id);

        let cache = self.clone();
        let key = entry.key().clone();
        tokio::spawn(async move {
            let outcome = fetcher().await;
            cache.complete_fetch(&key, fetch_id, outcome);
        });
    }

    /// Applies a finished fetch. Completions are applied in the order they land.
    fn complete_fetch(&self, key: &CacheKey, fetch_id: u64, outcome: Result<ErasedValue>) {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        let CacheState { entries, stats } = &mut *state;

        let Some(entry) = entries.get_mut(key) else {
            debug!(%key, "dropping completion for evicted entry");
            return;
        };
        if entry.in_flight != Some(fetch_id) {
            debug!(%key, fetch_id, "dropping completion for replaced entry");
            return;
        }
        entry.in_flight = None;
        if entry.subscriber_count == 0 {
            // The idle window starts once the fetch has landed
            entry.gc_deadline = Some(now + entry.gc_time);
        }

        match outcome {
            Ok(value) => entry.apply_success(value, now),
            Err(error) => {
                warn!(%key, %error, "fetch failed");
                stats.record_failure();
                entry.apply_failure(error);
            }
        }

        if entry.refetch_after {
            // Invalidated while this fetch was running; the result may predate it.
            entry.refetch_after = false;
            if entry.subscriber_count > 0 {
                stats.record_fetch();
                self.start_fetch(entry);
                return;
            }
        } else {
            entry.invalidated = false;
        }
        entry.bump();
    }

    // == Invalidate ==
    /// Marks every entry under `prefix` stale and refetches the subscribed ones.
    ///
    /// Returns the number of matched entries.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        let mut state = self.shared.state.lock();
        let CacheState { entries, stats } = &mut *state;

        let mut matched = 0;
        for entry in entries.values_mut().filter(|e| e.key().starts_with(prefix)) {
            matched += 1;
            stats.record_invalidation();
            entry.invalidated = true;

            if entry.is_fetching() {
                entry.refetch_after = true;
            } else if entry.subscriber_count > 0 {
                stats.record_fetch();
                self.start_fetch(entry);
                continue;
            }
            entry.bump();
        }

        info!(%prefix, matched, "invalidated cache entries");
        matched
    }

    // == Subscriptions ==
    /// Registers an observer of `key`, cancelling any pending eviction.
    ///
    /// Subscribing to an unknown key creates an idle entry.
    pub fn subscribe(&self, key: &CacheKey) {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        state.evict_if_expired(key, now);
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone(), FetchOptions::default(), now));
        entry.add_subscriber();
        debug!(%key, subscribers = entry.subscriber_count(), "subscribed");
        state.sync_len();
    }

    /// Removes an observer of `key`. Dropping to zero arms the GC deadline.
    pub fn unsubscribe(&self, key: &CacheKey) {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.remove_subscriber(now);
            debug!(%key, subscribers = entry.subscriber_count(), "unsubscribed");
        }
    }

    // == Garbage Collection ==
    /// Evicts every entry whose GC deadline elapsed with no subscribers.
    ///
    /// Returns the number of entries removed.
    pub fn garbage_collect(&self) -> usize {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_gc_expired(now));
        let removed = before - state.entries.len();

        for _ in 0..removed {
            state.stats.record_eviction();
        }
        state.sync_len();
        removed
    }

    // == Direct Access ==
    /// Typed snapshot of `key` without fetching. Unknown keys read as idle.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Result<EntrySnapshot<T>> {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        state.evict_if_expired(key, now);
        match state.entries.get(key) {
            Some(entry) => entry.snapshot(now),
            None => Ok(EntrySnapshot::idle(key.clone())),
        }
    }

    /// Stores `value` under `key` as a fresh success, e.g. to seed data fetched
    /// elsewhere. A fetch in flight for the key still lands afterwards.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: CacheKey, value: T, options: FetchOptions) {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        state.evict_if_expired(&key, now);
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key, options, now));
        entry.stale_time = options.stale_time;
        entry.apply_success(Arc::new(value), now);
        entry.invalidated = false;
        entry.bump();
        state.sync_len();
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        state.evict_if_expired(key, now);
        state.entries.contains_key(key)
    }

    /// Drops every entry. Fetches still in flight are discarded when they land.
    pub fn clear(&self) -> usize {
        let mut state = self.shared.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.sync_len();
        info!(removed, "cleared cache");
        removed
    }

    // == Inspection ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    /// Summaries of every entry, ordered by rendered key.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        let mut infos: Vec<EntryInfo> = state.entries.values().map(|e| e.info(now)).collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Subscriber count for `key`, or None if no entry exists.
    pub fn subscriber_count(&self, key: &CacheKey) -> Option<usize> {
        let state = self.shared.state.lock();
        state.entries.get(key).map(CacheEntry::subscriber_count)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().entries.is_empty()
    }
}
