//! Mutation Controller
//!
//! Wraps a write operation and invalidates cache prefixes once it succeeds.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheKey, ResourceCache};
use crate::error::{CacheError, Result};
use crate::query::FetchFuture;

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&CacheError) + Send + Sync>;

// == Mutation Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

// == Mutation Options ==
/// Prefixes to invalidate on success plus optional callbacks.
pub struct MutationOptions<T> {
    pub invalidates: Vec<CacheKey>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> MutationOptions<T> {
    pub fn new() -> Self {
        Self {
            invalidates: Vec::new(),
            on_success: None,
            on_error: None,
        }
    }

    /// Adds a key prefix to invalidate after a successful mutation.
    pub fn invalidates(mut self, prefix: CacheKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CacheError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl<T> Default for MutationOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct MutationState {
    status: MutationStatus,
    error: Option<CacheError>,
    /// Id of the most recent `execute` call; only it may set the status
    latest: u64,
}

// == Mutation Controller ==
pub struct MutationController<I, T> {
    cache: ResourceCache,
    mutation_fn: Arc<dyn Fn(I) -> FetchFuture<T> + Send + Sync>,
    options: MutationOptions<T>,
    state: Mutex<MutationState>,
}

impl<I, T> MutationController<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    pub fn new<F, Fut>(cache: ResourceCache, mutation_fn: F, options: MutationOptions<T>) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            cache,
            mutation_fn: Arc::new(move |input: I| -> FetchFuture<T> { Box::pin(mutation_fn(input)) }),
            options,
            state: Mutex::new(MutationState {
                status: MutationStatus::Idle,
                error: None,
                latest: 0,
            }),
        }
    }

    /// Runs the mutation.
    ///
    /// On success every configured prefix is invalidated before `on_success`
    /// runs. On failure only `on_error` runs; the cache is left untouched.
    pub async fn execute(&self, input: I) -> Result<T> {
        let id = {
            let mut state = self.state.lock();
            state.latest += 1;
            state.status = MutationStatus::Pending;
            state.error = None;
            state.latest
        };

        let outcome = (self.mutation_fn)(input).await;

        match &outcome {
            Ok(result) => {
                for prefix in &self.options.invalidates {
                    self.cache.invalidate(prefix);
                }
                debug!(invalidated = self.options.invalidates.len(), "mutation succeeded");
                if let Some(callback) = &self.options.on_success {
                    callback(result);
                }
            }
            Err(error) => {
                warn!(%error, "mutation failed");
                if let Some(callback) = &self.options.on_error {
                    callback(error);
                }
            }
        }

        let mut state = self.state.lock();
        if state.latest == id {
            match &outcome {
                Ok(_) => state.status = MutationStatus::Success,
                Err(error) => {
                    state.status = MutationStatus::Error;
                    state.error = Some(error.clone());
                }
            }
        }
        outcome
    }

    pub fn status(&self) -> MutationStatus {
        self.state.lock().status
    }

    pub fn error(&self) -> Option<CacheError> {
        self.state.lock().error.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    /// Returns the controller to `Idle`, forgetting the last outcome.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.status = MutationStatus::Idle;
        state.error = None;
    }
}

impl<I, T> fmt::Debug for MutationController<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationController")
            .field("invalidates", &self.options.invalidates)
            .field("state", &*self.state.lock())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Category {
        name: String,
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_invalidates_then_calls_back() {
        let cache = ResourceCache::new();
        let key = CacheKey::new("categories").push("list");
        cache.set_data(
            key.clone(),
            vec!["old".to_string()],
            FetchOptions::default().stale_time(Duration::from_secs(60)),
        );

        let probe = cache.clone();
        let probe_key = key.clone();
        let seen_stale = Arc::new(Mutex::new(None));
        let seen = seen_stale.clone();

        let mutation = MutationController::new(
            cache.clone(),
            |name: String| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Category { name })
            },
            MutationOptions::new()
                .invalidates(CacheKey::new("categories"))
                .on_success(move |_: &Category| {
                    let snapshot = probe.peek::<Vec<String>>(&probe_key).unwrap();
                    *seen.lock() = Some(snapshot.is_stale);
                }),
        );

        let created = mutation.execute("Steel".to_string()).await.unwrap();
        assert_eq!(created.name, "Steel");
        assert_eq!(mutation.status(), MutationStatus::Success);
        assert_eq!(*seen_stale.lock(), Some(true));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_skips_invalidation() {
        let cache = ResourceCache::new();
        let key = CacheKey::new("quotations");
        cache.set_data(
            key.clone(),
            1u8,
            FetchOptions::default().stale_time(Duration::from_secs(60)),
        );

        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        let mutation = MutationController::new(
            cache.clone(),
            |_: u8| async { Err::<(), _>(CacheError::server(422, "missing customer")) },
            MutationOptions::new()
                .invalidates(CacheKey::new("quotations"))
                .on_error(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        );

        let result = mutation.execute(1).await;
        assert!(result.is_err());
        assert_eq!(mutation.status(), MutationStatus::Error);
        assert_eq!(mutation.error(), Some(CacheError::server(422, "missing customer")));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(!cache.peek::<u8>(&key).unwrap().is_stale);
        assert_eq!(cache.stats().invalidations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_pending_while_in_flight() {
        let cache = ResourceCache::new();
        let mutation = Arc::new(MutationController::new(
            cache,
            |_: ()| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            },
            MutationOptions::new(),
        ));

        assert_eq!(mutation.status(), MutationStatus::Idle);
        let running = {
            let mutation = mutation.clone();
            tokio::spawn(async move { mutation.execute(()).await })
        };
        tokio::task::yield_now().await;
        assert!(mutation.is_pending());

        running.await.unwrap().unwrap();
        assert_eq!(mutation.status(), MutationStatus::Success);

        mutation.reset();
        assert_eq!(mutation.status(), MutationStatus::Idle);
    }
}
