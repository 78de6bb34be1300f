//! # Listing Indexer Shared
//!
//! Plain data types shared by the repository, pipeline and binary crates:
//! the indexed [`Listing`], the inbound [`ListingEvent`], query parameters
//! ([`SearchCriteria`], [`PageRequest`]) and the outbound [`ListingResponse`].

mod criteria;
mod event;
mod listing;
mod page;
mod response;

pub use criteria::{QueryKey, SearchCriteria, ValidationError};
pub use event::{EventType, ListingEvent};
pub use listing::Listing;
pub use page::{PageRequest, SortDirection, SortOrder};
pub use response::ListingResponse;
