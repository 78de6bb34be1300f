//! Listing event processor implementation.
//!
//! Dispatches listing events to the `ListingStore` and implements the
//! read-through query path in front of it.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use listing_indexer_repository::{ListingCache, ListingStore};
use listing_indexer_shared::{
    EventType, Listing, ListingEvent, ListingResponse, PageRequest, QueryKey, SearchCriteria,
};

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The listing was written to the store (create or update).
    Indexed { listing_id: String },
    /// The listing was removed from the store.
    Deleted { listing_id: String },
    /// Nothing to do: unknown event type or missing id.
    Ignored,
    /// The store call failed; the event is dropped.
    Failed { listing_id: String, reason: String },
}

/// Applies listing events and answers listing queries.
///
/// Write-path failures are logged and swallowed: an event is attempted once
/// and never re-raised to the event source. The query path is the only one
/// that reports store failures to its caller.
pub struct ListingEventProcessor {
    store: Arc<dyn ListingStore>,
    cache: Arc<ListingCache>,
}

impl ListingEventProcessor {
    /// Create a processor over a store and the cache shared with it.
    pub fn new(store: Arc<dyn ListingStore>, cache: Arc<ListingCache>) -> Self {
        Self { store, cache }
    }

    /// Apply one event to the store.
    #[instrument(skip(self, event), fields(event_type = ?event.event_type))]
    pub async fn process(&self, event: ListingEvent) -> EventOutcome {
        let mut listing = event.car_listing;

        match event.event_type {
            EventType::Create | EventType::Update => {
                if !listing.has_id() {
                    if event.event_type == EventType::Update {
                        warn!("Ignoring update event without a listing id");
                        return EventOutcome::Ignored;
                    }
                    let id = listing.assign_generated_id();
                    debug!(listing_id = %id, "Generated id for new listing");
                }
                self.upsert(listing).await
            }
            EventType::Delete => {
                if !listing.has_id() {
                    warn!("Ignoring delete event without a listing id");
                    return EventOutcome::Ignored;
                }
                self.delete(listing.id).await
            }
            EventType::Unknown => {
                info!(event_id = %event.id, "Received an unknown event type");
                EventOutcome::Ignored
            }
        }
    }

    async fn upsert(&self, listing: Listing) -> EventOutcome {
        match self.store.upsert(&listing).await {
            Ok(()) => EventOutcome::Indexed {
                listing_id: listing.id,
            },
            Err(e) => {
                error!(listing_id = %listing.id, error = %e, "Dropping listing upsert");
                EventOutcome::Failed {
                    listing_id: listing.id,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn delete(&self, listing_id: String) -> EventOutcome {
        match self.store.delete(&listing_id).await {
            Ok(()) => EventOutcome::Deleted { listing_id },
            Err(e) => {
                error!(listing_id = %listing_id, error = %e, "Dropping listing delete");
                EventOutcome::Failed {
                    listing_id,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Search listings through the cache.
    ///
    /// A cache hit never reaches the store. On a miss the store result is
    /// cached unless a write invalidated the cache while the query ran.
    /// Store failures, including an open breaker, are returned as errors so
    /// that an empty result always means "no matches".
    #[instrument(skip(self, criteria, page))]
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        page: &PageRequest,
    ) -> Result<Vec<Listing>, PipelineError> {
        let key = QueryKey::new(criteria.clone(), page.clone());

        if let Some(listings) = self.cache.get(&key).await {
            debug!(count = listings.len(), "Listing query served from cache");
            return Ok(listings);
        }

        let ticket = self.cache.begin_fill().await;
        let listings = self.store.query(criteria, page).await?;
        self.cache.put(key, listings.clone(), ticket).await;

        Ok(listings)
    }

    /// Search listings and wrap the outcome in the response contract.
    pub async fn search_response(
        &self,
        criteria: &SearchCriteria,
        page: &PageRequest,
    ) -> ListingResponse {
        match self.search(criteria, page).await {
            Ok(listings) => ListingResponse::ok(listings),
            Err(e) => ListingResponse::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use listing_indexer_repository::{
        IndexingGateway, ListingIndexProvider, SearchIndexError, StoreError,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Mock store for testing
    #[derive(Default)]
    struct MockStore {
        upserts: Mutex<Vec<Listing>>,
        deletes: Mutex<Vec<String>>,
        queries: AtomicUsize,
        results: Mutex<Vec<Listing>>,
        failure: Mutex<Option<StoreError>>,
    }

    impl MockStore {
        async fn fail_with(&self, err: StoreError) {
            *self.failure.lock().await = Some(err);
        }

        async fn check(&self) -> Result<(), StoreError> {
            match self.failure.lock().await.clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ListingStore for MockStore {
        async fn upsert(&self, listing: &Listing) -> Result<(), StoreError> {
            self.check().await?;
            self.upserts.lock().await.push(listing.clone());
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.check().await?;
            self.deletes.lock().await.push(id.to_string());
            Ok(())
        }

        async fn query(
            &self,
            _criteria: &SearchCriteria,
            _page: &PageRequest,
        ) -> Result<Vec<Listing>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.check().await?;
            Ok(self.results.lock().await.clone())
        }
    }

    fn peugeot() -> Listing {
        Listing::new("1", "Peugeot", "308", 2015, 10000.0, 12000.0, "black")
    }

    fn processor() -> (ListingEventProcessor, Arc<MockStore>, Arc<ListingCache>) {
        let store = Arc::new(MockStore::default());
        let cache = Arc::new(ListingCache::default());
        let processor = ListingEventProcessor::new(store.clone(), cache.clone());
        (processor, store, cache)
    }

    #[tokio::test]
    async fn test_create_and_update_dispatch_upsert() {
        let (processor, store, _cache) = processor();

        let created = processor.process(ListingEvent::create(peugeot())).await;
        let updated = processor.process(ListingEvent::update(peugeot())).await;

        let indexed = EventOutcome::Indexed {
            listing_id: "1".to_string(),
        };
        assert_eq!(created, indexed);
        assert_eq!(updated, indexed);
        assert_eq!(store.upserts.lock().await.len(), 2);
        assert!(store.deletes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_dispatches_delete() {
        let (processor, store, _cache) = processor();

        let outcome = processor.process(ListingEvent::delete("1")).await;

        assert_eq!(
            outcome,
            EventOutcome::Deleted {
                listing_id: "1".to_string()
            }
        );
        assert_eq!(store.deletes.lock().await.as_slice(), &["1".to_string()]);
        assert!(store.upserts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let (processor, store, _cache) = processor();

        let event = ListingEvent::new("evt-1", EventType::Unknown, peugeot());
        assert_eq!(processor.process(event).await, EventOutcome::Ignored);

        assert!(store.upserts.lock().await.is_empty());
        assert!(store.deletes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_without_id_gets_generated_id() {
        let (processor, store, _cache) = processor();
        let mut listing = peugeot();
        listing.id = String::new();

        let outcome = processor.process(ListingEvent::create(listing)).await;

        let upserts = store.upserts.lock().await;
        assert_eq!(upserts.len(), 1);
        assert!(upserts[0].has_id());
        assert_eq!(
            outcome,
            EventOutcome::Indexed {
                listing_id: upserts[0].id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_id_on_update_and_delete_is_ignored() {
        let (processor, store, _cache) = processor();
        let mut listing = peugeot();
        listing.id = String::new();

        assert_eq!(
            processor.process(ListingEvent::update(listing)).await,
            EventOutcome::Ignored
        );
        assert_eq!(
            processor.process(ListingEvent::delete("")).await,
            EventOutcome::Ignored
        );
        assert!(store.upserts.lock().await.is_empty());
        assert!(store.deletes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let (processor, store, _cache) = processor();

        store.fail_with(StoreError::unavailable("connection refused")).await;
        let outcome = processor.process(ListingEvent::create(peugeot())).await;
        assert!(matches!(outcome, EventOutcome::Failed { .. }));

        store.fail_with(StoreError::rejected()).await;
        let outcome = processor.process(ListingEvent::delete("1")).await;
        assert_eq!(
            outcome,
            EventOutcome::Failed {
                listing_id: "1".to_string(),
                reason: "Circuit Breaker is open!".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_search_cache_hit_skips_store() {
        let (processor, store, _cache) = processor();
        store.results.lock().await.push(peugeot());
        let criteria = SearchCriteria::any().with_make("Peugeot");
        let page = PageRequest::default();

        let first = processor.search(&criteria, &page).await.unwrap();
        let second = processor.search(&criteria, &page).await.unwrap();

        assert_eq!(first, vec![peugeot()]);
        assert_eq!(second, first);
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);

        // A different page is a different key.
        processor.search(&criteria, &PageRequest::of(1, 20)).await.unwrap();
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_rejected_is_reported() {
        let (processor, store, cache) = processor();
        store.fail_with(StoreError::rejected()).await;

        let response = processor
            .search_response(&SearchCriteria::any(), &PageRequest::default())
            .await;

        assert!(!response.valid);
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("Circuit Breaker is open!"));
        assert_eq!(cache.stats().await.cached_queries, 0);
    }

    #[tokio::test]
    async fn test_search_no_matches_is_valid() {
        let (processor, _store, _cache) = processor();

        let response = processor
            .search_response(&SearchCriteria::any().with_make("Lada"), &PageRequest::default())
            .await;

        assert!(response.valid);
        assert_eq!(response.data, Some(vec![]));
        assert!(response.error.is_none());
    }

    /// In-memory index used to exercise the processor over a real gateway.
    #[derive(Default)]
    struct InMemoryIndex {
        documents: Mutex<HashMap<String, Listing>>,
    }

    #[async_trait]
    impl ListingIndexProvider for InMemoryIndex {
        async fn index_listing(&self, listing: &Listing) -> Result<(), SearchIndexError> {
            self.documents
                .lock()
                .await
                .insert(listing.id.clone(), listing.clone());
            Ok(())
        }

        async fn delete_listing(&self, id: &str) -> Result<(), SearchIndexError> {
            self.documents.lock().await.remove(id);
            Ok(())
        }

        async fn search(
            &self,
            criteria: &SearchCriteria,
            _page: &PageRequest,
        ) -> Result<Vec<Listing>, SearchIndexError> {
            let documents = self.documents.lock().await;
            let mut hits: Vec<Listing> = documents
                .values()
                .filter(|l| criteria.make.as_ref().map_or(true, |make| &l.make == make))
                .cloned()
                .collect();
            hits.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(hits)
        }

        async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_writes_invalidate_cached_queries() {
        let cache = Arc::new(ListingCache::default());
        let gateway = IndexingGateway::new(Arc::new(InMemoryIndex::default()), cache.clone());
        let processor = ListingEventProcessor::new(Arc::new(gateway), cache);
        let criteria = SearchCriteria::any().with_make("Peugeot");
        let page = PageRequest::default();

        processor.process(ListingEvent::create(peugeot())).await;
        assert_eq!(processor.search(&criteria, &page).await.unwrap(), vec![peugeot()]);

        let mut repainted = peugeot();
        repainted.color = "red".to_string();
        processor.process(ListingEvent::update(repainted.clone())).await;
        assert_eq!(processor.search(&criteria, &page).await.unwrap(), vec![repainted]);

        processor.process(ListingEvent::delete("1")).await;
        assert!(processor.search(&criteria, &page).await.unwrap().is_empty());
    }
}
