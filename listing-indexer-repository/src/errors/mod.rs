//! Error types for the listing indexer repository.

mod search_index_error;
mod store_error;

pub use search_index_error::{FailureKind, SearchIndexError};
pub use store_error::{CallError, StoreError, CIRCUIT_OPEN_MESSAGE};
