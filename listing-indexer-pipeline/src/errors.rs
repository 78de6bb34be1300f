//! Error types for the listing indexer pipeline.

use listing_indexer_repository::StoreError;
use thiserror::Error;

/// Errors that can occur in the listing indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The listing store could not serve the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Error parsing or decoding an inbound message.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Invalid pipeline configuration.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl PipelineError {
    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Whether the error means the listing service is degraded rather than
    /// the request being bad.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<rdkafka::error::KafkaError> for PipelineError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}
