//! Interface definitions for the listing store.
//!
//! `ListingStore` is the capability the pipeline depends on;
//! `ListingIndexProvider` is the physical search engine behind it. Both are
//! traits so backends and test doubles can be swapped in.

mod listing_index_provider;
mod listing_store;

pub use listing_index_provider::ListingIndexProvider;
pub use listing_store::ListingStore;
