//! Integration Tests for Query, Mutation and Search Flows
//!
//! End-to-end scenarios against a shared cache with paused time.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resource_cache::models::{ApiResult, Page, SearchParams};
use resource_cache::query::FetchFuture;
use resource_cache::{
    CacheError, CacheKey, MutationController, MutationOptions, PaginatedSearchController,
    QueryConfig, QueryController, ResourceCache, SearchOptions, SearchPhase,
};
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone, PartialEq)]
struct Product {
    id: u32,
    name: String,
}

/// Simulated backend holding `total` products per search term.
fn catalogue(
    total: usize,
    calls: Arc<AtomicUsize>,
) -> impl Fn(SearchParams) -> FetchFuture<Page<Product>> + Send + Sync + 'static {
    move |params: SearchParams| -> FetchFuture<Page<Product>> {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let start = (params.page as usize - 1) * params.limit as usize;
            let end = (start + params.limit as usize).min(total);
            let items = (start..end)
                .map(|i| Product {
                    id: i as u32,
                    name: format!("{}-{}", params.search, i),
                })
                .collect();
            let envelope = ApiResult::ok(Page::new(items, end < total));
            envelope.into_result()
        })
    }
}

// == Paginated Search ==

#[tokio::test(start_paused = true)]
async fn test_three_pages_accumulate_to_45_items() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut search = PaginatedSearchController::new(
        cache.clone(),
        CacheKey::new("products"),
        catalogue(45, calls.clone()),
        SearchOptions::new(20),
    );

    assert_ok!(search.set_search_term(""));
    let first = search.settled().await;
    assert_eq!(first.items.len(), 20);
    assert!(first.has_next_page);

    assert!(assert_ok!(search.load_more()));
    assert_eq!(search.status(), SearchPhase::LoadingMore);
    assert_eq!(search.settled().await.items.len(), 40);

    assert!(assert_ok!(search.load_more()));
    let last = search.settled().await;
    assert_eq!(last.items.len(), 45);
    assert!(!last.has_next_page);
    assert_eq!(last.current_page, 3);
    assert_eq!(last.items.iter().map(|p| p.id).collect::<Vec<_>>(), (0..45).collect::<Vec<_>>());

    assert!(!assert_ok!(search.load_more()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // One cache entry per page
    assert_eq!(cache.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_late_response_for_abandoned_term_is_discarded() {
    let cache = ResourceCache::new();
    let mut search = PaginatedSearchController::new(
        cache,
        CacheKey::new("products"),
        |params: SearchParams| async move {
            // "a" is slow, anything else is fast
            let delay = if params.search == "a" { 200 } else { 20 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(Page::new(vec![format!("{}-0", params.search), format!("{}-1", params.search)], false))
        },
        SearchOptions::new(2),
    );

    assert_ok!(search.set_search_term("a"));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_ok!(search.set_search_term("b"));
    assert_eq!(search.snapshot().items.len(), 0);

    let settled = search.settled().await;
    assert_eq!(settled.items, vec!["b-0", "b-1"]);

    // Let the slow "a" response land
    tokio::time::sleep(Duration::from_millis(500)).await;
    let snapshot = search.snapshot();
    assert_eq!(snapshot.search_term, "b");
    assert_eq!(snapshot.items, vec!["b-0", "b-1"]);
    assert_eq!(snapshot.status, SearchPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_failed_page_keeps_accumulated_items() {
    let cache = ResourceCache::new();
    let fail_page_two = Arc::new(AtomicBool::new(true));
    let flag = fail_page_two.clone();
    let mut search = PaginatedSearchController::new(
        cache,
        CacheKey::new("quotations"),
        move |params: SearchParams| {
            let fail = params.page == 2 && flag.load(Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if fail {
                    return ApiResult::<Page<u32>>::failure(503, "upstream unavailable").into_result();
                }
                let base = (params.page - 1) * params.limit;
                Ok(Page::new((base..base + params.limit).collect(), params.page < 3))
            }
        },
        SearchOptions::new(10),
    );

    assert_ok!(search.set_search_term("q"));
    search.settled().await;
    assert!(assert_ok!(search.load_more()));

    let failed = search.settled().await;
    assert_eq!(failed.status, SearchPhase::Error);
    assert_eq!(failed.items.len(), 10);
    assert_eq!(failed.error, Some(CacheError::server(503, "upstream unavailable")));
    assert!(!assert_ok!(search.load_more()));

    fail_page_two.store(false, Ordering::SeqCst);
    assert!(assert_ok!(search.retry()));
    let recovered = search.settled().await;
    assert_eq!(recovered.status, SearchPhase::Ready);
    assert_eq!(recovered.items.len(), 20);
    assert!(recovered.has_next_page);
}

#[tokio::test(start_paused = true)]
async fn test_revisiting_term_within_stale_time_uses_cache() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut search = PaginatedSearchController::new(
        cache,
        CacheKey::new("products"),
        catalogue(5, calls.clone()),
        SearchOptions::new(20).query(QueryConfig::new().stale_time(Duration::from_secs(60))),
    );

    assert_ok!(search.set_search_term("bolt"));
    search.settled().await;
    assert_ok!(search.set_search_term("nut"));
    search.settled().await;
    assert_ok!(search.set_search_term("bolt"));
    let snapshot = search.settled().await;

    assert_eq!(snapshot.items.len(), 5);
    assert_eq!(snapshot.items[0].name, "bolt-0");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// == Mutation + Query ==

#[tokio::test(start_paused = true)]
async fn test_mutation_refreshes_category_list() {
    let cache = ResourceCache::new();
    let backend = Arc::new(parking_lot::Mutex::new(vec!["Steel".to_string()]));

    let reader = backend.clone();
    let mut list = QueryController::new(
        cache.clone(),
        CacheKey::new("categories"),
        move |_: ()| {
            let rows = reader.lock().clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(rows)
            }
        },
        QueryConfig::new().stale_time(Duration::from_secs(300)),
    );
    assert_ok!(list.set_params(()));
    assert_eq!(list.settled().await.data.map(|rows| rows.len()), Some(1));

    let writer = backend.clone();
    let create = MutationController::new(
        cache.clone(),
        move |name: String| {
            writer.lock().push(name.clone());
            async move { Ok(name) }
        },
        MutationOptions::new().invalidates(CacheKey::new("categories")),
    );
    assert_eq!(assert_ok!(create.execute("Wood".to_string()).await), "Wood");

    let refreshed = list.settled().await;
    assert_eq!(refreshed.data.map(|rows| rows.len()), Some(2));
    assert!(!refreshed.is_stale);
}

#[tokio::test(start_paused = true)]
async fn test_failed_mutation_leaves_cache_fresh() {
    let cache = ResourceCache::new();
    let mut list = QueryController::new(
        cache.clone(),
        CacheKey::new("categories"),
        |_: ()| async { Ok(vec![1u32]) },
        QueryConfig::new().stale_time(Duration::from_secs(300)),
    );
    assert_ok!(list.set_params(()));
    list.settled().await;

    let create = MutationController::new(
        cache.clone(),
        |_: String| async { Err::<(), _>(CacheError::Network("offline".into())) },
        MutationOptions::new().invalidates(CacheKey::new("categories")),
    );
    assert_err!(create.execute("Wood".to_string()).await);

    let result = list.result();
    assert!(!result.is_stale);
    assert!(!result.is_fetching);
    assert_eq!(cache.stats().fetches, 1);
}
