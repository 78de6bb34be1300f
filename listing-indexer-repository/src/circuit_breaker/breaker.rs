//! Circuit breaker state machine.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::CircuitBreakerConfig;
use crate::errors::{CallError, FailureKind, SearchIndexError};

/// Errors that the breaker can classify.
pub trait Classify {
    /// The failure kind used to decide whether the error is recorded.
    fn failure_kind(&self) -> FailureKind;
}

impl Classify for SearchIndexError {
    fn failure_kind(&self) -> FailureKind {
        self.kind()
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally and outcomes are recorded.
    Closed,
    /// Calls are rejected without reaching the dependency.
    Open,
    /// A limited number of trial calls check whether the dependency recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    /// Calls currently held in the sliding window.
    pub buffered_calls: usize,
    /// Failed calls currently held in the sliding window.
    pub failed_calls: usize,
    /// Failure fraction, once the minimum number of calls is buffered.
    pub failure_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Ignored,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Bumped on every transition; permits from an older generation are stale.
    generation: u64,
    /// `true` marks a failed call.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_permits: u32,
    trial_successes: u32,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            window: VecDeque::new(),
            opened_at: None,
            trial_permits: 0,
            trial_successes: 0,
        }
    }

    fn failed_calls(&self) -> usize {
        self.window.iter().filter(|failed| **failed).count()
    }

    fn failure_rate(&self, minimum_calls: usize) -> Option<f64> {
        if self.window.len() < minimum_calls {
            return None;
        }
        Some(self.failed_calls() as f64 / self.window.len() as f64)
    }
}

/// A count-based circuit breaker shared by all callers of one dependency.
///
/// Every decision (admit, record, transition) happens inside a single lock,
/// so concurrent callers never observe or produce an intermediate state.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: config.normalized(),
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Name used in logs and rejections.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    ///
    /// An open breaker whose wait has elapsed still reports `Open` until the
    /// next call attempt moves it to `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock();
        CircuitMetrics {
            state: inner.state,
            buffered_calls: inner.window.len(),
            failed_calls: inner.failed_calls(),
            failure_rate: inner.failure_rate(self.config.minimum_calls),
        }
    }

    /// Open the circuit now, as if the failure threshold had been crossed.
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Open);
    }

    /// Close the circuit and clear the sliding window.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Run `operation` under the breaker.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The operation's result
    /// * `Err(CallError::Rejected)` - The circuit is open (or the half-open
    ///   trial is full); the operation was not invoked
    /// * `Err(CallError::Inner(e))` - The operation ran and failed
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let permit = self.acquire().ok_or_else(|| CallError::Rejected {
            breaker: self.name.clone(),
        })?;

        let result = operation().await;

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(e) if self.config.records(e.failure_kind()) => Outcome::Failure,
            Err(_) => Outcome::Ignored,
        };
        permit.settle(outcome);

        result.map_err(CallError::Inner)
    }

    fn acquire(&self) -> Option<Permit<'_>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map(|opened_at| opened_at.elapsed() >= self.config.open_state_duration)
                .unwrap_or(true);
            if elapsed {
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                debug!(breaker = %self.name, "Call rejected, circuit is open");
                return None;
            }
            CircuitState::HalfOpen => {
                if inner.trial_permits >= self.config.half_open_trial_calls {
                    debug!(breaker = %self.name, "Call rejected, half-open trial is full");
                    return None;
                }
                inner.trial_permits += 1;
            }
        }

        Some(Permit {
            breaker: self,
            generation: inner.generation,
            settled: false,
        })
    }

    fn on_outcome(&self, generation: u64, outcome: Outcome) {
        let mut inner = self.inner.lock();

        if inner.generation != generation {
            debug!(breaker = %self.name, ?outcome, "Discarding outcome from a previous state");
            return;
        }

        match (inner.state, outcome) {
            (CircuitState::Closed, Outcome::Ignored) | (CircuitState::Open, _) => {}
            (CircuitState::Closed, outcome) => {
                if inner.window.len() >= self.config.sliding_window_size {
                    inner.window.pop_front();
                }
                inner.window.push_back(outcome == Outcome::Failure);

                if let Some(rate) = inner.failure_rate(self.config.minimum_calls) {
                    if rate >= self.config.failure_rate_threshold {
                        warn!(
                            breaker = %self.name,
                            failure_rate = rate,
                            threshold = self.config.failure_rate_threshold,
                            "Failure rate exceeded threshold"
                        );
                        self.transition(&mut inner, CircuitState::Open);
                    }
                }
            }
            (CircuitState::HalfOpen, Outcome::Success) => {
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.half_open_trial_calls {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, Outcome::Failure) => {
                self.transition(&mut inner, CircuitState::Open);
            }
            (CircuitState::HalfOpen, Outcome::Ignored) => {
                inner.trial_permits = inner.trial_permits.saturating_sub(1);
            }
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;

        inner.state = to;
        inner.generation += 1;
        inner.window.clear();
        inner.trial_permits = 0;
        inner.trial_successes = 0;
        inner.opened_at = (to == CircuitState::Open).then(Instant::now);

        match to {
            CircuitState::Open => {
                warn!(breaker = %self.name, %from, %to, "Circuit breaker opened")
            }
            _ => info!(breaker = %self.name, %from, %to, "Circuit breaker state changed"),
        }
    }
}

/// Admission to run one call. Dropping it unsettled (e.g. the caller's
/// future was cancelled) releases the slot without recording an outcome.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.on_outcome(self.generation, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_outcome(self.generation, Outcome::Ignored);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::default())
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), CallError<SearchIndexError>> {
        breaker.call(|| async { Ok(()) }).await
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), CallError<SearchIndexError>> {
        breaker
            .call(|| async { Err::<(), _>(SearchIndexError::connection("refused")) })
            .await
    }

    async fn open(breaker: &CircuitBreaker) {
        for _ in 0..3 {
            let _ = fail(breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let breaker = breaker();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(succeed(&breaker).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_rate_below_minimum_calls() {
        let breaker = breaker();

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failed_calls, 2);
        assert!(metrics.failure_rate.is_none());
    }

    #[tokio::test]
    async fn test_opens_when_threshold_reached() {
        let breaker = breaker();

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Third call completes the minimum; 2/3 failed >= 50%.
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_stays_closed_below_threshold() {
        let breaker = breaker();

        for _ in 0..3 {
            assert!(succeed(&breaker).await.is_ok());
        }
        let _ = fail(&breaker).await;

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failure_rate, Some(0.25));
    }

    #[tokio::test]
    async fn test_window_is_sliding() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::default().with_sliding_window_size(4),
        );

        let _ = fail(&breaker).await;
        for _ in 0..6 {
            assert!(succeed(&breaker).await.is_ok());
        }

        let metrics = breaker.metrics();
        assert_eq!(metrics.buffered_calls, 4);
        assert_eq!(metrics.failed_calls, 0);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = breaker();
        open(&breaker).await;

        let invocations = AtomicUsize::new(0);
        let result: Result<(), CallError<SearchIndexError>> = breaker
            .call(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CallError::Rejected { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_non_recordable_errors_pass_through() {
        let breaker = breaker();

        for _ in 0..5 {
            let result: Result<(), _> = breaker
                .call(|| async { Err(SearchIndexError::index_not_found("car_listings")) })
                .await;
            assert!(matches!(
                result,
                Err(CallError::Inner(SearchIndexError::IndexNotFound(_)))
            ));
        }

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.buffered_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_wait() {
        let breaker = breaker();
        open(&breaker).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(matches!(succeed(&breaker).await, Err(CallError::Rejected { .. })));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_trial_successes() {
        let breaker = breaker();
        open(&breaker).await;
        tokio::time::advance(Duration::from_secs(60)).await;

        for _ in 0..2 {
            assert!(succeed(&breaker).await.is_ok());
            assert_eq!(breaker.state(), CircuitState::HalfOpen);
        }
        assert!(succeed(&breaker).await.is_ok());

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.buffered_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_reopens_on_failure() {
        let breaker = breaker();
        open(&breaker).await;
        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(succeed(&breaker).await.is_ok());
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // The wait restarts from the new opening.
        assert!(matches!(succeed(&breaker).await, Err(CallError::Rejected { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_limits_trial_calls() {
        let breaker = Arc::new(breaker());
        open(&breaker).await;
        tokio::time::advance(Duration::from_secs(60)).await;

        let mut senders = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = oneshot::channel::<()>();
            senders.push(tx);
            let breaker = breaker.clone();
            handles.push(tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        rx.await.map_err(|_| SearchIndexError::connection("dropped"))
                    })
                    .await
            }));
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(matches!(succeed(&breaker).await, Err(CallError::Rejected { .. })));

        for tx in senders {
            tx.send(()).unwrap();
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_releases_permit() {
        let breaker = breaker();
        open(&breaker).await;
        tokio::time::advance(Duration::from_secs(60)).await;

        let cancelled = tokio::time::timeout(
            Duration::from_secs(1),
            breaker.call(|| std::future::pending::<Result<(), SearchIndexError>>()),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        for _ in 0..3 {
            assert!(succeed(&breaker).await.is_ok());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_stale_outcome_is_discarded() {
        let breaker = Arc::new(breaker());
        let (tx, rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let pending = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        let _ = started_tx.send(());
                        let _ = rx.await;
                        Err::<(), _>(SearchIndexError::timeout("slow"))
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        breaker.force_open();
        breaker.reset();
        tx.send(()).unwrap();
        let _ = pending.await.unwrap();

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.buffered_calls, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_accounting() {
        let breaker = Arc::new(CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::default().with_sliding_window_size(1000),
        ));

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let breaker = breaker.clone();
                tokio::spawn(async move { succeed(&breaker).await })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }

        let metrics = breaker.metrics();
        assert_eq!(metrics.buffered_calls, 200);
        assert_eq!(metrics.failed_calls, 0);
        assert_eq!(metrics.state, CircuitState::Closed);
    }
}
