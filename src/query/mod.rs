//! Query Module
//!
//! Consumer-side controllers over the resource cache: reads
//! ([`QueryController`]) and writes that invalidate ([`MutationController`]).

mod config;
mod controller;
mod mutation;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

pub use config::{retry_backoff, QueryConfig, MAX_RETRY_DELAY};
pub use controller::{QueryController, QueryResult};
pub use mutation::{MutationController, MutationOptions, MutationStatus};

/// Boxed future produced by fetch and mutation functions.
pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
