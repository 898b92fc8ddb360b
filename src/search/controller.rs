//! Paginated Search Controller
//!
//! Drives page-by-page loading of a search through a [`QueryController`],
//! accumulating results and discarding responses that belong to an abandoned
//! search term or page.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{CacheKey, EntryHandle, EntrySnapshot, QueryStatus, ResourceCache};
use crate::error::{CacheError, Result};
use crate::models::{Page, SearchParams};
use crate::query::{QueryConfig, QueryController};
use crate::search::{ApplyOutcome, PageRequest, SearchPhase, SearchState};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// == Search Options ==
pub struct SearchOptions<T> {
    pub page_size: u32,
    /// Timing and retry policy for each page query
    pub query: QueryConfig<Page<T>>,
}

impl<T: Send + Sync + 'static> SearchOptions<T> {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            query: QueryConfig::new(),
        }
    }

    pub fn query(mut self, query: QueryConfig<Page<T>>) -> Self {
        self.query = query;
        self
    }
}

impl<T: Send + Sync + 'static> Default for SearchOptions<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

// == Search Snapshot ==
/// Point-in-time copy of the search state for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnapshot<T> {
    pub search_term: String,
    pub current_page: u32,
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub status: SearchPhase,
    #[serde(skip)]
    pub error: Option<CacheError>,
}

impl<T> SearchSnapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }
}

/// State shared between the controller and its page listeners.
struct Shared<T> {
    state: Mutex<SearchState<T>>,
    updates: watch::Sender<u64>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn snapshot(&self) -> SearchSnapshot<T> {
        let state = self.state.lock();
        SearchSnapshot {
            search_term: state.search_term().to_string(),
            current_page: state.current_page(),
            items: state.items().to_vec(),
            has_next_page: state.has_next_page(),
            status: state.phase(),
            error: state.last_error().cloned(),
        }
    }

    fn notify(&self) {
        self.updates.send_modify(|version| *version += 1);
    }

    /// Offers a settled page snapshot to the state machine.
    ///
    /// Returns false once `request` is no longer the active request, telling
    /// the listener to stop.
    fn offer(
        &self,
        request: &PageRequest,
        snapshot: &EntrySnapshot<Page<T>>,
        applied_at: &mut Option<Option<Instant>>,
    ) -> bool {
        let mut state = self.state.lock();
        if !state.is_current(request) {
            return false;
        }

        let outcome = match (*applied_at, snapshot.status) {
            (None, QueryStatus::Success) => {
                snapshot.data.as_deref().map(|page| state.apply(request, Ok(page)))
            }
            (None, QueryStatus::Error) => {
                snapshot.error.clone().map(|error| state.apply(request, Err(error)))
            }
            (Some(seen), QueryStatus::Success) if snapshot.fetched_at > seen => snapshot
                .data
                .as_deref()
                .map(|page| state.apply_refresh(request, page)),
            _ => None,
        };
        drop(state);

        match outcome {
            Some(ApplyOutcome::Applied) => {
                debug!(search = %request.search, page = request.page, "page applied");
                *applied_at = Some(snapshot.fetched_at);
                self.notify();
            }
            Some(ApplyOutcome::StaleResponseDiscarded) => {
                debug!(search = %request.search, page = request.page, "stale page response discarded");
            }
            None => {}
        }
        true
    }

    fn fail(&self, request: &PageRequest, error: CacheError) {
        let outcome = self.state.lock().apply(request, Err(error));
        if outcome == ApplyOutcome::Applied {
            self.notify();
        }
    }
}

// == Paginated Search Controller ==
/// Incremental "load more" search over a paginated endpoint.
///
/// Each page is a separate cache entry keyed by
/// `base_key ++ {search, page, limit}`, so revisiting a term within its stale
/// window is served from cache and invalidating `base_key` reaches every page.
pub struct PaginatedSearchController<T> {
    query: QueryController<SearchParams, Page<T>>,
    shared: Arc<Shared<T>>,
    updates: watch::Receiver<u64>,
    /// Bumped per issued request; listeners for older requests stop on change
    epoch: watch::Sender<u64>,
    page_size: u32,
}

impl<T> PaginatedSearchController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(
        cache: ResourceCache,
        base_key: CacheKey,
        fetch_page: F,
        options: SearchOptions<T>,
    ) -> Self
    where
        F: Fn(SearchParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>>> + Send + 'static,
    {
        let (updates_tx, updates) = watch::channel(0);
        let (epoch, _) = watch::channel(0);
        Self {
            query: QueryController::new(cache, base_key, fetch_page, options.query),
            shared: Arc::new(Shared {
                state: Mutex::new(SearchState::new()),
                updates: updates_tx,
            }),
            updates,
            epoch,
            page_size: options.page_size,
        }
    }

    // == Commands ==
    /// Switches to `term`, resetting to page 1 with an empty list.
    ///
    /// Setting the active term again is a no-op. The first call always issues
    /// a request, even for an empty term.
    pub fn set_search_term(&mut self, term: impl Into<String>) -> Result<()> {
        let term = term.into();
        SearchParams::new(term.as_str(), 1, self.page_size).validate()?;

        let Some(request) = self.shared.state.lock().begin_search(term) else {
            return Ok(());
        };
        info!(search = %request.search, generation = request.generation, "search term changed");
        self.issue(request)
    }

    /// Requests the next page.
    ///
    /// Returns false without doing anything unless results are ready and the
    /// last page reported more.
    pub fn load_more(&mut self) -> Result<bool> {
        let Some(request) = self.shared.state.lock().begin_load_more() else {
            return Ok(false);
        };
        debug!(search = %request.search, page = request.page, "loading more");
        self.issue(request)?;
        Ok(true)
    }

    /// Re-issues the request that failed. Returns false unless in `Error`.
    pub fn retry(&mut self) -> Result<bool> {
        let Some(request) = self.shared.state.lock().begin_retry() else {
            return Ok(false);
        };
        debug!(search = %request.search, page = request.page, "retrying page");
        self.issue(request)?;
        Ok(true)
    }

    fn issue(&mut self, request: PageRequest) -> Result<()> {
        let params = SearchParams::new(request.search.as_str(), request.page, self.page_size);
        if let Err(error) = self.query.set_params(params) {
            self.shared.fail(&request, error.clone());
            return Err(error);
        }

        self.epoch.send_modify(|epoch| *epoch += 1);
        self.shared.notify();

        if let Some(handle) = self.query.handle() {
            let shared = Arc::clone(&self.shared);
            let epoch = self.epoch.subscribe();
            tokio::spawn(follow_page(handle, request, shared, epoch));
        }
        Ok(())
    }

    // == Reading ==
    pub fn snapshot(&self) -> SearchSnapshot<T> {
        self.shared.snapshot()
    }

    pub fn items(&self) -> Vec<T> {
        self.shared.state.lock().items().to_vec()
    }

    pub fn has_next_page(&self) -> bool {
        self.shared.state.lock().has_next_page()
    }

    pub fn status(&self) -> SearchPhase {
        self.shared.state.lock().phase()
    }

    pub fn search_term(&self) -> String {
        self.shared.state.lock().search_term().to_string()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Waits for the next state change.
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }

    /// Waits until no page is loading and returns the resulting state.
    pub async fn settled(&mut self) -> SearchSnapshot<T> {
        loop {
            self.updates.borrow_and_update();
            let snapshot = self.shared.snapshot();
            if !snapshot.is_loading() || self.updates.changed().await.is_err() {
                return snapshot;
            }
        }
    }
}

impl<T> fmt::Debug for PaginatedSearchController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedSearchController")
            .field("page_size", &self.page_size)
            .field("query", &self.query)
            .finish()
    }
}

/// Feeds settled snapshots of one page entry into the search state until the
/// request is superseded, the entry disappears, or the controller is dropped.
///
/// A request still loading when its entry disappears moves to `Error`, so
/// `retry()` can re-issue it.
async fn follow_page<T>(
    mut handle: EntryHandle<Page<T>>,
    request: PageRequest,
    shared: Arc<Shared<T>>,
    mut epoch: watch::Receiver<u64>,
) where
    T: Clone + Send + Sync + 'static,
{
    let mut applied_at = None;
    loop {
        match handle.snapshot() {
            Ok(snapshot) if !snapshot.is_fetching => {
                if !shared.offer(&request, &snapshot, &mut applied_at) {
                    debug!(search = %request.search, page = request.page, "page listener superseded");
                    return;
                }
            }
            Ok(_) => {
                if !shared.state.lock().is_current(&request) {
                    return;
                }
            }
            Err(error) => {
                shared.fail(&request, error);
                return;
            }
        }

        tokio::select! {
            alive = handle.changed() => if !alive {
                // Entry cleared or evicted; its fetch result will never arrive
                shared.fail(
                    &request,
                    CacheError::Network("page entry removed before its fetch completed".to_string()),
                );
                return;
            },
            moved = epoch.changed() => if moved.is_err() { return },
        }
    }
}
