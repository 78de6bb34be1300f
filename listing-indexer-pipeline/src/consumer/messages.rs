//! Message types for the consumer.
//!
//! Defines what flows from the consumer to the orchestrator and how raw
//! Kafka payloads become listing events.

use listing_indexer_shared::ListingEvent;

use crate::errors::PipelineError;

/// Messages that flow through the pipeline.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of decoded listing events.
    Events(Vec<ListingEvent>),
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}

/// Decode a JSON listing event.
///
/// Unknown `eventType` values decode to `EventType::Unknown`; anything that
/// is not a well-formed event is a parse error.
pub fn parse_listing_event(payload: &[u8]) -> Result<ListingEvent, PipelineError> {
    serde_json::from_slice(payload)
        .map_err(|e| PipelineError::parse(format!("Failed to decode listing event: {}", e)))
}
