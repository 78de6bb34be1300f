//! Indexing gateway implementation.
//!
//! This module provides the `ListingStore` used by the pipeline. Every call
//! goes through the circuit breaker to the physical index provider, and
//! every successful write is followed by the matching cache mutation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::ListingCache;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::errors::{CallError, SearchIndexError, StoreError};
use crate::interfaces::{ListingIndexProvider, ListingStore};
use listing_indexer_shared::{Listing, PageRequest, SearchCriteria};

/// Name of the breaker protecting the listing index.
pub const INDEX_CIRCUIT_BREAKER: &str = "listing-index";

/// `ListingStore` over a physical index provider with failure isolation.
///
/// - A missing index is a no-op on writes and an empty result on queries.
/// - Transport and timeout failures count toward the breaker's failure rate.
/// - The cache is mutated only after the index write outcome is known.
pub struct IndexingGateway {
    provider: Arc<dyn ListingIndexProvider>,
    breaker: CircuitBreaker,
    cache: Arc<ListingCache>,
}

impl IndexingGateway {
    /// Create a gateway with the default breaker configuration.
    pub fn new(provider: Arc<dyn ListingIndexProvider>, cache: Arc<ListingCache>) -> Self {
        Self::with_config(provider, cache, CircuitBreakerConfig::default())
    }

    /// Create a gateway with a custom breaker configuration.
    pub fn with_config(
        provider: Arc<dyn ListingIndexProvider>,
        cache: Arc<ListingCache>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            provider,
            breaker: CircuitBreaker::new(INDEX_CIRCUIT_BREAKER, breaker_config),
            cache,
        }
    }

    /// The breaker guarding the index.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    fn failure(&self, operation: &str, err: CallError<SearchIndexError>) -> StoreError {
        match &err {
            CallError::Rejected { breaker } => {
                error!(breaker = %breaker, operation, "Circuit breaker is open");
            }
            CallError::Inner(e) => {
                error!(operation, error = %e, "Error during communication with the listing index");
            }
        }
        StoreError::from(err)
    }
}

#[async_trait]
impl ListingStore for IndexingGateway {
    #[instrument(skip(self, listing), fields(listing_id = %listing.id))]
    async fn upsert(&self, listing: &Listing) -> Result<(), StoreError> {
        match self.breaker.call(|| self.provider.index_listing(listing)).await {
            Ok(()) => {
                info!("Listing saved to index");
                self.cache.refresh_listing(listing.clone()).await;
                Ok(())
            }
            Err(CallError::Inner(e)) if e.is_index_absent() => {
                warn!(error = %e, "Skipping upsert, listing index is not created");
                self.cache.invalidate_queries().await;
                Ok(())
            }
            Err(e) => Err(self.failure("upsert", e)),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self.breaker.call(|| self.provider.delete_listing(id)).await {
            Ok(()) => {
                info!("Listing removed from index");
                self.cache.invalidate_by_listing_id(id).await;
                Ok(())
            }
            Err(CallError::Inner(e)) if e.is_index_absent() => {
                warn!(error = %e, "Skipping delete, listing index is not created");
                self.cache.invalidate_by_listing_id(id).await;
                Ok(())
            }
            Err(e) => Err(self.failure("delete", e)),
        }
    }

    #[instrument(skip(self, criteria, page))]
    async fn query(
        &self,
        criteria: &SearchCriteria,
        page: &PageRequest,
    ) -> Result<Vec<Listing>, StoreError> {
        match self
            .breaker
            .call(|| self.provider.search(criteria, page))
            .await
        {
            Ok(listings) => {
                debug!(count = listings.len(), "Listing query executed");
                Ok(listings)
            }
            Err(CallError::Inner(e)) if e.is_index_absent() => {
                warn!(error = %e, "Listing index is not created yet, returning no results");
                Ok(Vec::new())
            }
            Err(e) => Err(self.failure("query", e)),
        }
    }
}
