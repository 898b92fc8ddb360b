//! Query Controller
//!
//! Binds a (possibly changing) cache key to a fetch function and exposes the
//! entry's state to one consumer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheKey, EntryHandle, QueryStatus, ResourceCache};
use crate::error::{CacheError, Result};
use crate::query::{retry_backoff, FetchFuture, QueryConfig};

type SharedFetch<P, T> = Arc<dyn Fn(P) -> FetchFuture<T> + Send + Sync>;

// == Query Result ==
/// What a consumer sees when reading a query.
#[derive(Debug, Clone)]
pub struct QueryResult<S> {
    pub status: QueryStatus,
    /// Projected value; also present after a failed refetch (last known good)
    pub data: Option<S>,
    pub error: Option<CacheError>,
    pub is_fetching: bool,
    pub is_stale: bool,
}

impl<S> QueryResult<S> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

// == Query Controller ==
/// One consumer of the cache, keyed by `base_key ++ params`.
///
/// While enabled and bound to params the controller holds one subscription
/// on its current entry; changing params moves the subscription, and dropping
/// the controller releases it.
pub struct QueryController<P, T, S = Arc<T>> {
    cache: ResourceCache,
    base_key: CacheKey,
    fetch_fn: SharedFetch<P, T>,
    config: QueryConfig<T, S>,
    params: Option<P>,
    current: Option<EntryHandle<T>>,
}

impl<P, T, S> QueryController<P, T, S>
where
    P: Serialize + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(
        cache: ResourceCache,
        base_key: CacheKey,
        fetch_fn: F,
        config: QueryConfig<T, S>,
    ) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let fetch_fn: SharedFetch<P, T> =
            Arc::new(move |params: P| -> FetchFuture<T> { Box::pin(fetch_fn(params)) });
        Self {
            cache,
            base_key,
            fetch_fn,
            config,
            params: None,
            current: None,
        }
    }

    /// Builds the key for `params`. Malformed params fail here, before any fetch.
    pub fn key_for(&self, params: &P) -> Result<CacheKey> {
        self.base_key.clone().with_params(params)
    }

    // == Binding ==
    /// Points the controller at `params`.
    ///
    /// A new key moves the subscription to the new entry; the same key only
    /// re-checks staleness. If the bound entry was cleared meanwhile, the
    /// subscription is re-established on a fresh entry.
    pub fn set_params(&mut self, params: P) -> Result<()> {
        let key = self.key_for(&params)?;
        self.params = Some(params.clone());

        if !self.config.enabled {
            return Ok(());
        }
        let bound = self.current.as_ref().is_some_and(|h| h.key() == &key);
        if bound && self.cache.contains(&key) {
            self.current = Some(self.request(key, params));
            return Ok(());
        }

        self.detach();
        self.attach(key, params);
        Ok(())
    }

    /// Enables or disables the query. Disabling releases the subscription.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.config.enabled = enabled;
        if !enabled {
            self.detach();
            return Ok(());
        }
        if self.current.is_none() {
            if let Some(params) = self.params.clone() {
                let key = self.key_for(&params)?;
                self.attach(key, params);
            }
        }
        Ok(())
    }

    /// Re-evaluates staleness of the current entry, refetching if needed.
    pub fn refresh(&mut self) {
        let key = self.current.as_ref().map(|handle| handle.key().clone());
        if let (Some(key), Some(params)) = (key, self.params.clone()) {
            self.current = Some(self.request(key, params));
        }
    }

    /// Forces a refetch of the current entry. Returns false when unbound.
    pub fn refetch(&self) -> bool {
        match &self.current {
            Some(handle) => self.cache.refetch(handle.key()),
            None => false,
        }
    }

    fn attach(&mut self, key: CacheKey, params: P) {
        let handle = self.request(key.clone(), params);
        self.cache.subscribe(&key);
        debug!(%key, "query attached");
        self.current = Some(handle);
    }

    fn detach(&mut self) {
        if let Some(handle) = self.current.take() {
            self.cache.unsubscribe(handle.key());
            debug!(key = %handle.key(), "query detached");
        }
    }

    fn request(&self, key: CacheKey, params: P) -> EntryHandle<T> {
        let fetch_fn = Arc::clone(&self.fetch_fn);
        let retry_count = self.config.retry_count;
        let retry_delay = self.config.retry_delay;
        let retry_key = key.clone();

        self.cache.fetch_or_reuse(
            key,
            move || {
                let fetch_fn = Arc::clone(&fetch_fn);
                let params = params.clone();
                let key = retry_key.clone();
                async move {
                    let mut attempt = 0;
                    loop {
                        match fetch_fn(params.clone()).await {
                            Err(error) if error.is_retryable() && attempt < retry_count => {
                                let delay = retry_backoff(retry_delay, attempt);
                                debug!(%key, %error, attempt, ?delay, "retrying fetch");
                                tokio::time::sleep(delay).await;
                                attempt += 1;
                            }
                            outcome => return outcome,
                        }
                    }
                }
            },
            self.config.fetch,
        )
    }

    // == Reading ==
    pub fn key(&self) -> Option<&CacheKey> {
        self.current.as_ref().map(EntryHandle::key)
    }

    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    /// Handle on the current entry, for consumers that await it themselves.
    pub fn handle(&self) -> Option<EntryHandle<T>> {
        self.current.clone()
    }

    /// Current state with `select` applied to the value.
    pub fn result(&self) -> QueryResult<S> {
        let Some(handle) = self.current.as_ref().filter(|_| self.config.enabled) else {
            return QueryResult::idle();
        };
        match handle.snapshot() {
            Ok(snapshot) => QueryResult {
                status: snapshot.status,
                data: snapshot.data.as_ref().map(|value| self.config.project(value)),
                error: snapshot.error,
                is_fetching: snapshot.is_fetching,
                is_stale: snapshot.is_stale,
            },
            Err(error) => QueryResult {
                status: QueryStatus::Error,
                data: None,
                error: Some(error),
                is_fetching: false,
                is_stale: true,
            },
        }
    }

    /// Waits for the current entry to change. Returns false when unbound.
    pub async fn changed(&mut self) -> bool {
        match self.current.as_mut() {
            Some(handle) => handle.changed().await,
            None => false,
        }
    }

    /// Waits until the current entry has no fetch in flight.
    pub async fn settled(&mut self) -> QueryResult<S> {
        if let Some(handle) = self.current.as_mut() {
            // A type mismatch surfaces through `result()` below
            let _ = handle.settled().await;
        }
        self.result()
    }
}

impl<P, T, S> Drop for QueryController<P, T, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            self.cache.unsubscribe(handle.key());
        }
    }
}

impl<P: fmt::Debug, T, S> fmt::Debug for QueryController<P, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryController")
            .field("base_key", &self.base_key)
            .field("params", &self.params)
            .field("current", &self.current)
            .field("config", &self.config)
            .finish()
    }
}
