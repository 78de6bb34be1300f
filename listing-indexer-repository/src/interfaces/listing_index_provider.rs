//! Listing index provider trait definition.
//!
//! This module defines the abstract interface for the physical search
//! engine, allowing for different backend implementations (OpenSearch,
//! Elasticsearch, in-memory test doubles).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use listing_indexer_shared::{Listing, PageRequest, SearchCriteria};

/// Abstracts the underlying search index implementation.
///
/// Implementations report raw engine outcomes. In particular a missing index
/// must surface as `SearchIndexError::IndexNotFound` so callers can treat it
/// as a no-op instead of a fault.
///
/// Writes must be visible to `search` by the time they return. The gateway
/// flushes cached query results right after a write, and a fill that reads
/// pre-write data after that flush would be kept until the next mutation.
#[async_trait]
pub trait ListingIndexProvider: Send + Sync {
    /// Index a single listing.
    ///
    /// If a document with the same ID already exists, it will be replaced.
    ///
    /// # Arguments
    ///
    /// * `listing` - The listing to index; its `id` is the document ID
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the listing was indexed successfully
    /// * `Err(SearchIndexError)` - If indexing fails
    async fn index_listing(&self, listing: &Listing) -> Result<(), SearchIndexError>;

    /// Delete a listing from the search index.
    ///
    /// If the document doesn't exist, the operation is considered successful.
    ///
    /// # Arguments
    ///
    /// * `id` - The listing's document ID
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the listing was deleted (or didn't exist)
    /// * `Err(SearchIndexError)` - If the deletion fails
    async fn delete_listing(&self, id: &str) -> Result<(), SearchIndexError>;

    /// Execute a filtered, paginated search.
    ///
    /// # Arguments
    ///
    /// * `criteria` - Field filters combined with AND
    /// * `page` - Page number, size and sort orders
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Listing>)` - Matching listings in engine order
    /// * `Err(SearchIndexError)` - If the search fails
    async fn search(
        &self,
        criteria: &SearchCriteria,
        page: &PageRequest,
    ) -> Result<Vec<Listing>, SearchIndexError>;

    /// Ensure the search index exists with proper mappings.
    ///
    /// If the index doesn't exist, it will be created with the listing
    /// mappings. Intended for application startup.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(SearchIndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
