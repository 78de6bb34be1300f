//! OpenSearch implementation of the listing index provider.
//!
//! This module provides a concrete implementation of `ListingIndexProvider`
//! using OpenSearch as the backend.

mod client;
mod index_config;
mod queries;

pub use client::OpenSearchClient;
pub use index_config::{get_index_settings, IndexConfig, DEFAULT_INDEX_NAME};
pub use queries::build_search_query;
