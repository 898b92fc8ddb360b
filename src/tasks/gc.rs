//! Garbage Collection Task
//!
//! Background sweep that evicts entries nobody has observed for their gc window.
//! Reads evict lazily as well, so the sweep only bounds memory held by keys
//! that are never touched again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ResourceCache;

/// Spawns a task that runs [`ResourceCache::garbage_collect`] every
/// `interval_secs` seconds.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = ResourceCache::new();
/// let gc_handle = spawn_gc_task(cache.clone(), 1);
/// // Later, during shutdown:
/// gc_handle.abort();
/// ```
pub fn spawn_gc_task(cache: ResourceCache, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting gc task with interval of {} seconds", interval.as_secs());

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.garbage_collect();
            if removed > 0 {
                info!("GC sweep: evicted {} idle entries", removed);
            } else {
                debug!("GC sweep: nothing to evict");
            }
        }
    })
}
