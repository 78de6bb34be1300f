//! Read-through cache for listing queries.
//!
//! Query results are keyed by [`QueryKey`]; listings are also kept by id for
//! write-through refreshes. Any successful mutation flushes every cached
//! query result, because a result set keyed by criteria can gain or lose a
//! listing without the listing's id appearing in it.
//!
//! Population races with invalidation are resolved in favour of the
//! invalidation: a reader takes a [`FillTicket`] before querying the index,
//! and `put` drops the result if any invalidation happened in between.

use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use listing_indexer_shared::{Listing, QueryKey};

/// Default number of cached query results.
const DEFAULT_QUERY_CAPACITY: usize = 1000;

/// Default number of listings kept by id.
const DEFAULT_LISTING_CAPACITY: usize = 10_000;

/// Configuration for the listing cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached query results before LRU eviction.
    pub query_capacity: usize,
    /// Maximum number of listings cached by id before LRU eviction.
    pub listing_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_capacity: DEFAULT_QUERY_CAPACITY,
            listing_capacity: DEFAULT_LISTING_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Create a config with a custom query result capacity.
    pub fn with_query_capacity(query_capacity: usize) -> Self {
        Self {
            query_capacity,
            ..Default::default()
        }
    }
}

/// Proof of the invalidation generation observed before a cache miss was
/// sent to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cached_queries: usize,
    pub cached_listings: usize,
    pub hits: u64,
    pub misses: u64,
    /// Fills dropped because an invalidation raced with them.
    pub stale_fills: u64,
    pub invalidations: u64,
}

struct CacheInner {
    queries: LruCache<QueryKey, Vec<Listing>>,
    listings: LruCache<String, Listing>,
    generation: u64,
    stats: CacheStats,
}

impl CacheInner {
    fn flush_queries(&mut self) {
        self.queries.clear();
        self.generation += 1;
        self.stats.invalidations += 1;
    }
}

/// Query-result cache shared by the read and write paths.
///
/// The index stays authoritative; anything here may be evicted at any time.
pub struct ListingCache {
    inner: Mutex<CacheInner>,
}

impl ListingCache {
    /// Create a cache with the given capacities. Zero capacities are raised to one.
    pub fn new(config: CacheConfig) -> Self {
        let query_capacity = NonZeroUsize::new(config.query_capacity).unwrap_or(NonZeroUsize::MIN);
        let listing_capacity =
            NonZeroUsize::new(config.listing_capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Mutex::new(CacheInner {
                queries: LruCache::new(query_capacity),
                listings: LruCache::new(listing_capacity),
                generation: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Look up a cached query result.
    pub async fn get(&self, key: &QueryKey) -> Option<Vec<Listing>> {
        let mut inner = self.inner.lock().await;
        let hit = inner.queries.get(key).cloned();
        if hit.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        hit
    }

    /// Take a ticket before querying the index on a miss.
    pub async fn begin_fill(&self) -> FillTicket {
        FillTicket(self.inner.lock().await.generation)
    }

    /// Store a query result computed under `ticket`.
    ///
    /// Returns `false` (and stores nothing) when an invalidation happened
    /// after the ticket was taken.
    pub async fn put(&self, key: QueryKey, value: Vec<Listing>, ticket: FillTicket) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != ticket.0 {
            inner.stats.stale_fills += 1;
            debug!(
                ticket = ticket.0,
                generation = inner.generation,
                "Dropping cache fill raced by invalidation"
            );
            return false;
        }
        inner.queries.put(key, value);
        true
    }

    /// Evict everything that could contain listing `id`.
    ///
    /// Removes the listing itself and flushes all cached query results.
    pub async fn invalidate_by_listing_id(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        inner.listings.pop(id);
        inner.flush_queries();
        debug!(listing_id = %id, "Invalidated cache for listing");
    }

    /// Write-through after a successful upsert: cache the listing by id and
    /// flush all query results.
    pub async fn refresh_listing(&self, listing: Listing) {
        let mut inner = self.inner.lock().await;
        debug!(listing_id = %listing.id, "Refreshed cached listing");
        inner.listings.put(listing.id.clone(), listing);
        inner.flush_queries();
    }

    /// Flush cached query results without touching the listing region.
    pub async fn invalidate_queries(&self) {
        self.inner.lock().await.flush_queries();
    }

    /// The most recently written version of listing `id`, if cached.
    pub async fn listing(&self, id: &str) -> Option<Listing> {
        self.inner.lock().await.listings.get(id).cloned()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.listings.clear();
        inner.flush_queries();
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            cached_queries: inner.queries.len(),
            cached_listings: inner.listings.len(),
            ..inner.stats
        }
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
