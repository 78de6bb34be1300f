//! Search index error types.
//!
//! This module defines the errors raised by the physical index adapter and
//! the [`FailureKind`] classification the circuit breaker records against.

use thiserror::Error;

/// Coarse classification of a downstream failure.
///
/// The circuit breaker is configured with the subset of kinds that count
/// toward its failure rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The index has not been created yet.
    IndexAbsent,
    /// Connection refused, reset or otherwise failed at the transport level.
    Transport,
    /// The request timed out.
    Timeout,
    /// The engine answered with a 5xx status.
    ServerError,
    /// The engine refused the request (4xx other than index-absent).
    Rejected,
    /// The request or response body could not be encoded or decoded.
    Malformed,
}

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// The target index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// The search engine answered with a non-success status.
    #[error("Request failed with status {status}: {body}")]
    ResponseError { status: u16, body: String },

    /// Failed to parse response from search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error (e.g., missing required fields).
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl SearchIndexError {
    /// Create an index-not-found error.
    pub fn index_not_found(index: impl Into<String>) -> Self {
        Self::IndexNotFound(index.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Create a response error.
    pub fn response(status: u16, body: impl Into<String>) -> Self {
        Self::ResponseError {
            status,
            body: body.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Classify this error for circuit-breaker accounting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::IndexNotFound(_) => FailureKind::IndexAbsent,
            Self::ConnectionError(_) => FailureKind::Transport,
            Self::TimeoutError(_) => FailureKind::Timeout,
            Self::ResponseError { status, .. } if *status >= 500 => FailureKind::ServerError,
            Self::ResponseError { .. } | Self::ValidationError(_) => FailureKind::Rejected,
            Self::ParseError(_) | Self::SerializationError(_) => FailureKind::Malformed,
        }
    }

    /// Whether the index simply does not exist yet.
    pub fn is_index_absent(&self) -> bool {
        self.kind() == FailureKind::IndexAbsent
    }
}
