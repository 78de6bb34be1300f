//! Errors surfaced through the `ListingStore` contract and the breaker.

use thiserror::Error;

/// Message carried by a rejection while the circuit breaker is open.
pub const CIRCUIT_OPEN_MESSAGE: &str = "Circuit Breaker is open!";

/// Failure of a guarded call.
#[derive(Debug, Clone, Error)]
pub enum CallError<E> {
    /// The breaker refused the call; the operation was not invoked.
    #[error("Circuit breaker '{breaker}' rejected the call")]
    Rejected { breaker: String },

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

/// Errors returned by `ListingStore` operations.
///
/// Either way the operation did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The index could not be reached or failed to execute the request.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The circuit breaker is open and refused the call.
    #[error("{0}")]
    DependencyRejected(String),
}

impl StoreError {
    /// Create a dependency-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DependencyUnavailable(msg.into())
    }

    /// Create the rejection raised while the breaker is open.
    pub fn rejected() -> Self {
        Self::DependencyRejected(CIRCUIT_OPEN_MESSAGE.to_string())
    }

    /// Whether the breaker refused the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::DependencyRejected(_))
    }
}

impl<E: std::fmt::Display> From<CallError<E>> for StoreError {
    fn from(err: CallError<E>) -> Self {
        match err {
            CallError::Rejected { .. } => Self::rejected(),
            CallError::Inner(e) => Self::unavailable(e.to_string()),
        }
    }
}
