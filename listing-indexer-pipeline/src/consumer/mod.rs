//! Consumer module for the listing indexer pipeline.
//!
//! Provides Kafka consumer functionality for receiving listing events.

mod kafka_consumer;
mod messages;

pub use kafka_consumer::{KafkaConsumer, DEFAULT_LISTING_TOPIC};
pub use messages::{parse_listing_event, StreamMessage};
