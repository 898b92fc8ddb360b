//! API Module
//!
//! Devtools HTTP API for inspecting and steering a running resource cache.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `GET /entries` - Summary of every live entry
//! - `POST /invalidate` - Invalidate every entry under a key prefix
//! - `POST /gc` - Run a garbage collection sweep now
//! - `DELETE /entries` - Drop every entry

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
