//! Entry Handle Module
//!
//! Typed, awaitable view of one cache entry.

use std::fmt;
use std::marker::PhantomData;

use tokio::sync::watch;

use crate::cache::{CacheKey, EntrySnapshot, ResourceCache};
use crate::error::Result;

// == Entry Handle ==
/// Handle returned by [`ResourceCache::fetch_or_reuse`].
///
/// The handle does not own the value; each read snapshots the entry. Awaiting
/// [`EntryHandle::changed`] or [`EntryHandle::settled`] suspends until the
/// entry moves on.
pub struct EntryHandle<T> {
    cache: ResourceCache,
    key: CacheKey,
    changes: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> EntryHandle<T> {
    pub(crate) fn new(cache: ResourceCache, key: CacheKey, changes: watch::Receiver<u64>) -> Self {
        Self {
            cache,
            key,
            changes,
            _marker: PhantomData,
        }
    }

    /// Current state of the entry.
    pub fn snapshot(&self) -> Result<EntrySnapshot<T>> {
        self.cache.peek(&self.key)
    }

    /// Waits for the next state change.
    ///
    /// Returns false once the entry is gone (evicted or cleared).
    pub async fn changed(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    /// Waits until no fetch is in flight for the entry and returns its state.
    pub async fn settled(&mut self) -> Result<EntrySnapshot<T>> {
        loop {
            self.changes.borrow_and_update();
            let snapshot = self.snapshot()?;
            if !snapshot.is_fetching {
                return Ok(snapshot);
            }
            if self.changes.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

impl<T> EntryHandle<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl<T> Clone for EntryHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            key: self.key.clone(),
            changes: self.changes.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for EntryHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryHandle").field("key", &self.key).finish()
    }
}
