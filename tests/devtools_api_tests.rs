//! Integration Tests for the Devtools API
//!
//! Drives a real cache through controllers, then inspects and steers it over
//! the HTTP router.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use resource_cache::{
    api::create_router, AppState, CacheKey, QueryConfig, QueryController, ResourceCache,
};
use serde_json::Value;
use tokio_test::assert_ok;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app(cache: &ResourceCache) -> Router {
    create_router(AppState::new(cache.clone()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn category_query(cache: &ResourceCache) -> QueryController<String, Vec<String>> {
    QueryController::new(
        cache.clone(),
        CacheKey::new("categories"),
        |search: String| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(vec![format!("{}-steel", search), format!("{}-wood", search)])
        },
        QueryConfig::new().stale_time(Duration::from_secs(30)),
    )
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let cache = ResourceCache::new();
    let (status, json) = send(create_test_app(&cache), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

// == STATS / ENTRIES Endpoint Tests ==

#[tokio::test(start_paused = true)]
async fn test_stats_reflect_query_activity() {
    let cache = ResourceCache::new();
    let mut first = category_query(&cache);
    let mut second = category_query(&cache);

    assert_ok!(first.set_params("x".to_string()));
    assert_ok!(second.set_params("x".to_string()));
    first.settled().await;
    second.settled().await;

    let (status, json) = send(create_test_app(&cache), "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["deduplicated"], 1);
    assert_eq!(json["fetches"], 1);
    assert_eq!(json["total_entries"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_entries_listing() {
    let cache = ResourceCache::new();
    let mut query = category_query(&cache);
    assert_ok!(query.set_params("x".to_string()));
    query.settled().await;

    let (status, json) = send(create_test_app(&cache), "GET", "/entries", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    let entry = &json["entries"][0];
    assert_eq!(entry["key"], r#"["categories","x"]"#);
    assert_eq!(entry["status"], "success");
    assert_eq!(entry["subscriber_count"], 1);
    assert_eq!(entry["has_value"], true);
}

// == INVALIDATE Endpoint Tests ==

#[tokio::test(start_paused = true)]
async fn test_invalidate_refetches_subscribed_query() {
    let cache = ResourceCache::new();
    let mut query = category_query(&cache);
    assert_ok!(query.set_params("x".to_string()));
    query.settled().await;

    let (status, json) = send(
        create_test_app(&cache),
        "POST",
        "/invalidate",
        Some(r#"{"prefix":["categories"]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matched"], 1);

    // Still readable while the refetch runs
    let during = query.result();
    assert!(during.is_fetching);
    assert_eq!(during.data.map(|items| items.len()), Some(2));

    let after = query.settled().await;
    assert!(after.is_success());
    assert!(!after.is_stale);
    assert_eq!(cache.stats().fetches, 2);
}

#[tokio::test]
async fn test_invalidate_with_unknown_prefix() {
    let cache = ResourceCache::new();
    let (status, json) = send(
        create_test_app(&cache),
        "POST",
        "/invalidate",
        Some(r#"{"prefix":["nothing", {"page": 1}]}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matched"], 0);
}

#[tokio::test]
async fn test_invalidate_rejects_float_segment() {
    let cache = ResourceCache::new();
    let (status, json) = send(
        create_test_app(&cache),
        "POST",
        "/invalidate",
        Some(r#"{"prefix":["prices", 0.5]}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Validation"));
}

#[tokio::test]
async fn test_invalid_json_request() {
    let cache = ResourceCache::new();
    let app = create_test_app(&cache);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/invalidate")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == GC / CLEAR Endpoint Tests ==

#[tokio::test(start_paused = true)]
async fn test_gc_endpoint_evicts_released_entries() {
    let cache = ResourceCache::new();
    let mut query = QueryController::new(
        cache.clone(),
        CacheKey::new("products"),
        |_: ()| async { Ok(7u32) },
        QueryConfig::new().gc_time(Duration::from_secs(5)),
    );
    assert_ok!(query.set_params(()));
    query.settled().await;
    drop(query);

    let (_, json) = send(create_test_app(&cache), "POST", "/gc", None).await;
    assert_eq!(json["removed"], 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let (status, json) = send(create_test_app(&cache), "POST", "/gc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clear_endpoint() {
    let cache = ResourceCache::new();
    let mut query = category_query(&cache);
    assert_ok!(query.set_params("x".to_string()));
    query.settled().await;

    let (status, json) = send(create_test_app(&cache), "DELETE", "/entries", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);
    assert!(cache.is_empty());
}
