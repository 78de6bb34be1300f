//! # Listing Indexer Pipeline
//!
//! This crate provides the pipeline components for consuming car listing
//! events from Kafka and applying them to the listing index.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives listing events from Kafka and decodes them
//! 2. **Processor**: Dispatches each event to the `ListingStore` and serves
//!    cached listing queries
//! 3. **Orchestrator**: Coordinates the flow with bounded concurrency and
//!    handles shutdown

pub mod consumer;
pub mod errors;
pub mod orchestrator;
pub mod processor;

pub use errors::PipelineError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use processor::{EventOutcome, ListingEventProcessor};
