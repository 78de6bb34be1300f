//! Listing store trait definition.

use async_trait::async_trait;

use crate::errors::StoreError;
use listing_indexer_shared::{Listing, PageRequest, SearchCriteria};

/// Capability interface over the external listing index.
///
/// # Error Handling
///
/// Every operation may fail with `StoreError::DependencyUnavailable`
/// (network, timeout, engine failure) or `StoreError::DependencyRejected`
/// (circuit open). In both cases the operation did not happen; there is no
/// partial outcome.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Create or replace the listing with the same `id`.
    ///
    /// Idempotent; success is the absence of an error.
    async fn upsert(&self, listing: &Listing) -> Result<(), StoreError>;

    /// Delete the listing with the given id.
    ///
    /// Deleting an id that does not exist is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Query listings matching `criteria`, one page at a time.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Listing>)` - The page of matches, empty when nothing
    ///   matches or the index does not exist yet
    /// * `Err(StoreError)` - If the index could not be queried
    async fn query(
        &self,
        criteria: &SearchCriteria,
        page: &PageRequest,
    ) -> Result<Vec<Listing>, StoreError>;
}
