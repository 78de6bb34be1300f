//! Circuit breaker guarding calls to the search index.
//!
//! One breaker instance is created per protected dependency and shared by
//! every caller. It moves through CLOSED, OPEN and HALF_OPEN based on a
//! count-based sliding window of recorded outcomes.

mod breaker;
mod config;

pub use breaker::{CircuitBreaker, CircuitMetrics, CircuitState, Classify};
pub use config::CircuitBreakerConfig;
