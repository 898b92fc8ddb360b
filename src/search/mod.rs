//! Search Module
//!
//! Incremental paginated search built on the query layer.

mod controller;
mod state;

pub use controller::{PaginatedSearchController, SearchOptions, SearchSnapshot, DEFAULT_PAGE_SIZE};
pub use state::{ApplyOutcome, PageRequest, SearchPhase, SearchState};
