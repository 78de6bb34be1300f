//! Configuration types for the circuit breaker.

use std::collections::HashSet;
use std::time::Duration;

use crate::errors::FailureKind;

/// Configuration for a [`CircuitBreaker`](super::CircuitBreaker).
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Fraction of failed calls in the window that opens the circuit.
    pub failure_rate_threshold: f64,
    /// Number of most recent calls kept in the sliding window.
    pub sliding_window_size: usize,
    /// Calls required in the window before a failure rate is computed.
    pub minimum_calls: usize,
    /// How long the circuit stays open before allowing trial calls.
    pub open_state_duration: Duration,
    /// Consecutive successful trial calls needed to close again.
    pub half_open_trial_calls: u32,
    /// Failure kinds that count toward the failure rate. Other errors pass
    /// through without touching breaker state.
    pub recordable_failures: HashSet<FailureKind>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_size: 10,
            minimum_calls: 3,
            open_state_duration: Duration::from_secs(60),
            half_open_trial_calls: 3,
            recordable_failures: HashSet::from([
                FailureKind::Transport,
                FailureKind::Timeout,
                FailureKind::ServerError,
            ]),
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure rate threshold (fraction in `0.0..=1.0`).
    pub fn with_failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = threshold;
        self
    }

    /// Set the sliding window size.
    pub fn with_sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    /// Set the minimum number of calls before evaluation.
    pub fn with_minimum_calls(mut self, calls: usize) -> Self {
        self.minimum_calls = calls;
        self
    }

    /// Set how long the circuit stays open.
    pub fn with_open_state_duration(mut self, duration: Duration) -> Self {
        self.open_state_duration = duration;
        self
    }

    /// Set the number of trial calls in half-open state.
    pub fn with_half_open_trial_calls(mut self, calls: u32) -> Self {
        self.half_open_trial_calls = calls;
        self
    }

    /// Replace the set of recordable failure kinds.
    pub fn with_recordable_failures(
        mut self,
        kinds: impl IntoIterator<Item = FailureKind>,
    ) -> Self {
        self.recordable_failures = kinds.into_iter().collect();
        self
    }

    /// Whether failures of this kind count toward the failure rate.
    pub fn records(&self, kind: FailureKind) -> bool {
        self.recordable_failures.contains(&kind)
    }

    /// Clamp out-of-range values so the state machine stays well defined.
    pub(crate) fn normalized(mut self) -> Self {
        self.sliding_window_size = self.sliding_window_size.max(1);
        self.minimum_calls = self.minimum_calls.clamp(1, self.sliding_window_size);
        self.half_open_trial_calls = self.half_open_trial_calls.max(1);
        self.failure_rate_threshold = self.failure_rate_threshold.clamp(0.0, 1.0);
        self
    }
}
