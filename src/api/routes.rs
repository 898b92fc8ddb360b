//! API Routes
//!
//! Configures the Axum router with all devtools endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, entries_handler, gc_handler, health_handler, invalidate_handler, stats_handler,
    AppState,
};

/// Creates the devtools router.
///
/// # Middleware
/// - CORS: Allows any origin so browser devtools panels can connect
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/entries", get(entries_handler).delete(clear_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/gc", post(gc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
