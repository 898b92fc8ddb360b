//! Background Tasks Module
//!
//! Periodic work that runs alongside the cache.
//!
//! # Tasks
//! - Garbage collection: evicts unsubscribed entries whose gc window elapsed

mod gc;

pub use gc::spawn_gc_task;
