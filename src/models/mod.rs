//! Data models
//!
//! Transport envelope and page shapes consumed by fetch functions, plus the
//! DTOs used by the devtools HTTP API.

pub mod api_result;
pub mod page;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use api_result::ApiResult;
pub use page::{Page, SearchParams};
pub use requests::InvalidateRequest;
pub use responses::{
    EntriesResponse, HealthResponse, InvalidateResponse, RemovedResponse, StatsResponse,
};
