//! Processor module for the listing indexer pipeline.
//!
//! Applies listing events to the store and serves cached listing queries.

mod listing_event_processor;

pub use listing_event_processor::{EventOutcome, ListingEventProcessor};
