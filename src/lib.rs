//! Builds Elasticsearch search requests and executes them,
//! either one at a time or batched through the multi-search API.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod multi_search;
pub mod request_log;
pub mod results;
pub mod retry;
pub mod search;
pub mod transport;

#[cfg(test)]
mod testing;

pub use crate::client::{new_client, Client, Search, SearchError};
pub use crate::config::Configuration;
pub use crate::multi_search::{MultiSearch, MultiSearchError};
pub use crate::results::{Document, ResultCollection};
pub use crate::retry::RetryPolicy;
pub use crate::search::query::{BooleanQuery, Query};
pub use crate::search::SearchRequest;
