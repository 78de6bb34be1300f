//! # Listing Indexer Repository
//!
//! Everything behind the [`ListingStore`] seam: the physical index adapter
//! for OpenSearch, the circuit breaker that guards it, the query-result
//! cache, and the [`IndexingGateway`] that composes the three.

pub mod cache;
pub mod circuit_breaker;
pub mod errors;
pub mod gateway;
pub mod interfaces;
pub mod opensearch;

pub use cache::{CacheConfig, CacheStats, FillTicket, ListingCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState};
pub use errors::{CallError, FailureKind, SearchIndexError, StoreError};
pub use gateway::IndexingGateway;
pub use interfaces::{ListingIndexProvider, ListingStore};
pub use opensearch::{IndexConfig, OpenSearchClient};
