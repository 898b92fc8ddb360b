//! Paginated search state machine
//!
//! Pure bookkeeping for one search session: which page is wanted, what has been
//! accumulated, and whether an arriving response still belongs to the session.

use serde::Serialize;

use crate::error::CacheError;
use crate::models::Page;

// == Search Phase ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// No search issued yet
    Idle,
    LoadingFirstPage,
    /// Results available; more may be requested
    Ready,
    LoadingMore,
    /// Last request failed; accumulated results are kept
    Error,
}

impl SearchPhase {
    pub fn is_loading(self) -> bool {
        matches!(self, SearchPhase::LoadingFirstPage | SearchPhase::LoadingMore)
    }
}

// == Page Request ==
/// Tag attached to every page request; responses are matched against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub id: u64,
    pub generation: u64,
    pub search: String,
    pub page: u32,
}

/// Result of offering a response to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The response belongs to an abandoned request and was dropped
    StaleResponseDiscarded,
}

// == Search State ==
#[derive(Debug, Clone)]
pub struct SearchState<T> {
    search_term: String,
    current_page: u32,
    accumulated: Vec<T>,
    /// Index in `accumulated` where the current page's items start
    page_start: usize,
    has_next_page: bool,
    phase: SearchPhase,
    /// Bumped on every search-term change
    generation: u64,
    next_request: u64,
    active_request: Option<u64>,
    last_error: Option<CacheError>,
}

impl<T: Clone> SearchState<T> {
    pub fn new() -> Self {
        Self {
            search_term: String::new(),
            current_page: 1,
            accumulated: Vec::new(),
            page_start: 0,
            has_next_page: false,
            phase: SearchPhase::Idle,
            generation: 0,
            next_request: 0,
            active_request: None,
            last_error: None,
        }
    }

    // == Transitions ==
    /// Starts a new search for `term`.
    ///
    /// Returns None when `term` is already the active search. Anything in
    /// flight for the previous term becomes stale immediately.
    pub fn begin_search(&mut self, term: String) -> Option<PageRequest> {
        if self.phase != SearchPhase::Idle && term == self.search_term {
            return None;
        }
        self.generation += 1;
        self.search_term = term;
        self.current_page = 1;
        self.accumulated.clear();
        self.page_start = 0;
        self.has_next_page = false;
        self.last_error = None;
        self.phase = SearchPhase::LoadingFirstPage;
        Some(self.issue())
    }

    /// Requests the next page. Returns None unless `Ready` with more pages.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if self.phase != SearchPhase::Ready || !self.has_next_page {
            return None;
        }
        self.current_page += 1;
        self.phase = SearchPhase::LoadingMore;
        Some(self.issue())
    }

    /// Re-issues the failed request. Returns None unless in `Error`.
    pub fn begin_retry(&mut self) -> Option<PageRequest> {
        if self.phase != SearchPhase::Error {
            return None;
        }
        self.last_error = None;
        self.phase = if self.current_page == 1 {
            SearchPhase::LoadingFirstPage
        } else {
            SearchPhase::LoadingMore
        };
        Some(self.issue())
    }

    fn issue(&mut self) -> PageRequest {
        self.next_request += 1;
        self.active_request = Some(self.next_request);
        PageRequest {
            id: self.next_request,
            generation: self.generation,
            search: self.search_term.clone(),
            page: self.current_page,
        }
    }

    /// Whether a response tagged with `request` may still touch the state.
    pub fn is_current(&self, request: &PageRequest) -> bool {
        self.active_request == Some(request.id)
            && request.generation == self.generation
            && request.page == self.current_page
            && request.search == self.search_term
    }

    /// Applies the first response for `request`.
    ///
    /// Page 1 replaces the list, later pages append in arrival order. A failure
    /// keeps everything accumulated so far.
    pub fn apply(&mut self, request: &PageRequest, outcome: Result<&Page<T>, CacheError>) -> ApplyOutcome {
        if !self.is_current(request) || !self.phase.is_loading() {
            return ApplyOutcome::StaleResponseDiscarded;
        }
        match outcome {
            Ok(page) => {
                if request.page == 1 {
                    self.accumulated.clear();
                }
                self.page_start = self.accumulated.len();
                self.accumulated.extend(page.items.iter().cloned());
                self.has_next_page = page.has_next_page;
                self.last_error = None;
                self.phase = SearchPhase::Ready;
            }
            Err(error) => {
                self.last_error = Some(error);
                self.phase = SearchPhase::Error;
            }
        }
        ApplyOutcome::Applied
    }

    /// Applies a later refetch of the current page (e.g. after invalidation).
    ///
    /// The most recently completed fetch decides `has_next_page`; the page's
    /// items are swapped in place.
    pub fn apply_refresh(&mut self, request: &PageRequest, page: &Page<T>) -> ApplyOutcome {
        if !self.is_current(request) || self.phase != SearchPhase::Ready {
            return ApplyOutcome::StaleResponseDiscarded;
        }
        self.accumulated.truncate(self.page_start);
        self.accumulated.extend(page.items.iter().cloned());
        self.has_next_page = page.has_next_page;
        ApplyOutcome::Applied
    }

    // == Accessors ==
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn items(&self) -> &[T] {
        &self.accumulated
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&CacheError> {
        self.last_error.as_ref()
    }
}

impl<T: Clone> Default for SearchState<T> {
    fn default() -> Self {
        Self::new()
    }
}
