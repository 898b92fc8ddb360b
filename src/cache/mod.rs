//! Cache Module
//!
//! Provides the process-wide resource cache: keyed async fetch results with
//! staleness, de-duplication, prefix invalidation and idle garbage collection.

mod entry;
mod handle;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, EntryInfo, EntrySnapshot, ErasedValue, FetchOptions, QueryStatus};
pub use handle::EntryHandle;
pub use key::{CacheKey, KeyPart};
pub use stats::CacheStats;
pub use store::ResourceCache;
