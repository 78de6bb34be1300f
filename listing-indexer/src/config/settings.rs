//! Environment-driven settings.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::IndexingError;
use listing_indexer_pipeline::consumer::DEFAULT_LISTING_TOPIC;
use listing_indexer_pipeline::OrchestratorConfig;
use listing_indexer_repository::opensearch::DEFAULT_INDEX_NAME;
use listing_indexer_repository::{CacheConfig, CircuitBreakerConfig, IndexConfig};

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "car-listing-group";

/// Everything the indexer reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub index: IndexConfig,
    /// Create the listing index with its mappings at startup if missing.
    pub auto_create_index: bool,
    pub kafka_broker: String,
    pub kafka_group_id: String,
    pub kafka_topic: String,
    pub cache: CacheConfig,
    pub orchestrator: OrchestratorConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `LISTING_INDEX_NAME`: Listing index name (default: car_listings)
    /// - `OPENSEARCH_TIMEOUT_SECS`: Per-request timeout (default: 5)
    /// - `LISTING_INDEX_AUTO_CREATE`: Create the index with listing mappings at startup (default: true)
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: car-listing-group)
    /// - `KAFKA_TOPIC`: Listing event topic (default: car-listing-topic)
    /// - `CACHE_CAPACITY`: Cached query results (default: 1000)
    /// - `EVENT_CONCURRENCY`: Events processed at once (default: 16)
    /// - `CIRCUIT_BREAKER_FAILURE_RATE`: Failure rate that opens the breaker (default: 0.5)
    /// - `CIRCUIT_BREAKER_WINDOW_SIZE`: Sliding window size in calls (default: 10)
    /// - `CIRCUIT_BREAKER_MIN_CALLS`: Calls before the rate is evaluated (default: 3)
    /// - `CIRCUIT_BREAKER_OPEN_SECS`: Seconds spent open (default: 60)
    /// - `CIRCUIT_BREAKER_HALF_OPEN_CALLS`: Trial calls in half-open (default: 3)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let index = IndexConfig::new(
            vars.string("LISTING_INDEX_NAME", DEFAULT_INDEX_NAME),
            Duration::from_secs(vars.parse("OPENSEARCH_TIMEOUT_SECS", 5u64)?),
        );

        let cache = CacheConfig::with_query_capacity(vars.parse("CACHE_CAPACITY", 1000usize)?);

        let orchestrator = OrchestratorConfig {
            event_concurrency: vars.parse("EVENT_CONCURRENCY", 16usize)?,
            ..Default::default()
        };

        let defaults = CircuitBreakerConfig::default();
        let failure_rate =
            vars.parse("CIRCUIT_BREAKER_FAILURE_RATE", defaults.failure_rate_threshold)?;
        if !(failure_rate > 0.0 && failure_rate <= 1.0) {
            return Err(IndexingError::config(format!(
                "CIRCUIT_BREAKER_FAILURE_RATE must be in (0, 1], got {}",
                failure_rate
            )));
        }
        let circuit_breaker = defaults
            .clone()
            .with_failure_rate_threshold(failure_rate)
            .with_sliding_window_size(
                vars.parse("CIRCUIT_BREAKER_WINDOW_SIZE", defaults.sliding_window_size)?,
            )
            .with_minimum_calls(vars.parse("CIRCUIT_BREAKER_MIN_CALLS", defaults.minimum_calls)?)
            .with_open_state_duration(Duration::from_secs(
                vars.parse("CIRCUIT_BREAKER_OPEN_SECS", defaults.open_state_duration.as_secs())?,
            ))
            .with_half_open_trial_calls(
                vars.parse("CIRCUIT_BREAKER_HALF_OPEN_CALLS", defaults.half_open_trial_calls)?,
            );

        Ok(Self {
            opensearch_url: vars.string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            index,
            auto_create_index: vars.parse("LISTING_INDEX_AUTO_CREATE", true)?,
            kafka_broker: vars.string("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            kafka_group_id: vars.string("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            kafka_topic: vars.string("KAFKA_TOPIC", DEFAULT_LISTING_TOPIC),
            cache,
            orchestrator,
            circuit_breaker,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, IndexingError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e| {
                IndexingError::config(format!("Invalid value for {}: {:?} ({})", key, raw, e))
            }),
        }
    }
}
