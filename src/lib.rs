//! Resource Cache - an in-process async data cache
//!
//! Shares fetched resources between consumers keyed by structured cache keys,
//! with stale-while-revalidate reads, request de-duplication, prefix
//! invalidation, idle eviction, and an incremental paginated search on top.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod search;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheKey, EntryHandle, EntrySnapshot, FetchOptions, QueryStatus, ResourceCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use query::{MutationController, MutationOptions, QueryConfig, QueryController, QueryResult};
pub use search::{PaginatedSearchController, SearchOptions, SearchPhase, SearchSnapshot};
pub use tasks::spawn_gc_task;
