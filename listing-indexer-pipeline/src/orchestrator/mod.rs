//! Orchestrator module for the listing indexer pipeline.
//!
//! Coordinates the consumer and the processor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, instrument};

use crate::consumer::{KafkaConsumer, StreamMessage};
use crate::errors::PipelineError;
use crate::processor::{EventOutcome, ListingEventProcessor};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// Maximum number of events processed at the same time.
    pub event_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            event_concurrency: 16,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.channel_buffer_size == 0 {
            return Err(PipelineError::validation(
                "channel_buffer_size must be greater than zero",
            ));
        }
        if self.event_concurrency == 0 {
            return Err(PipelineError::validation(
                "event_concurrency must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Event counts for one run of the pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    indexed: AtomicU64,
    deleted: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl PipelineStats {
    fn record(&self, outcome: &EventOutcome) {
        let counter = match outcome {
            EventOutcome::Indexed { .. } => &self.indexed,
            EventOutcome::Deleted { .. } => &self.deleted,
            EventOutcome::Ignored => &self.ignored,
            EventOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn indexed(&self) -> u64 {
        self.indexed.load(Ordering::Relaxed)
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Drain `receiver`, processing up to `concurrency` events at a time.
///
/// Returns once the consumer sends `StreamMessage::End` or drops its sender.
/// Events have no ordering guarantee relative to each other.
pub async fn process_stream(
    processor: Arc<ListingEventProcessor>,
    receiver: mpsc::Receiver<StreamMessage>,
    concurrency: usize,
) -> PipelineStats {
    let events = futures::stream::unfold(receiver, |mut rx| async move {
        loop {
            match rx.recv().await? {
                StreamMessage::Events(events) => return Some((futures::stream::iter(events), rx)),
                StreamMessage::Error(e) => error!(error = %e, "Received error from consumer"),
                StreamMessage::End => return None,
            }
        }
    })
    .flatten();

    let stats = PipelineStats::default();
    events
        .for_each_concurrent(concurrency, |event| {
            let processor = processor.clone();
            let stats = &stats;
            async move {
                let outcome = processor.process(event).await;
                stats.record(&outcome);
            }
        })
        .await;

    stats
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Manages the lifecycle of the consumer
/// - Routes decoded events to the processor with bounded concurrency
/// - Handles shutdown signals, draining events already received
pub struct Orchestrator {
    consumer: Arc<KafkaConsumer>,
    processor: Arc<ListingEventProcessor>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(consumer: KafkaConsumer, processor: Arc<ListingEventProcessor>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer: Arc::new(consumer),
            processor,
            config: OrchestratorConfig::default(),
            shutdown_tx,
        }
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: KafkaConsumer,
        processor: Arc<ListingEventProcessor>,
        config: OrchestratorConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let mut orchestrator = Self::new(consumer, processor);
        orchestrator.config = config;
        Ok(orchestrator)
    }

    /// Run the orchestrator.
    ///
    /// This method starts the consumer and processes events until the
    /// consumer stream ends or Ctrl-C is received.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), PipelineError> {
        info!("Starting listing indexer orchestrator");

        self.consumer.subscribe()?;

        let (tx, rx) = mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        // Start consumer in background
        let consumer = self.consumer.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(tx, shutdown_rx).await {
                error!(error = %e, "Consumer error");
            }
        });

        let shutdown_tx = self.shutdown_tx.clone();
        let signal_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
            }
        });

        let stats = process_stream(
            self.processor.clone(),
            rx,
            self.config.event_concurrency,
        )
        .await;

        signal_handle.abort();
        let _ = consumer_handle.await;

        info!(
            indexed = stats.indexed(),
            deleted = stats.deleted(),
            ignored = stats.ignored(),
            failed = stats.failed(),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use listing_indexer_repository::{ListingCache, ListingStore, StoreError};
    use listing_indexer_shared::{EventType, Listing, ListingEvent, PageRequest, SearchCriteria};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Store that tracks how many calls are in flight at once.
    #[derive(Default)]
    struct SlowStore {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowStore {
        async fn work(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ListingStore for SlowStore {
        async fn upsert(&self, listing: &Listing) -> Result<(), StoreError> {
            self.work().await;
            if listing.make == "Broken" {
                return Err(StoreError::unavailable("timeout"));
            }
            Ok(())
        }

        async fn delete(&self, _id: &str) -> Result<(), StoreError> {
            self.work().await;
            Ok(())
        }

        async fn query(
            &self,
            _criteria: &SearchCriteria,
            _page: &PageRequest,
        ) -> Result<Vec<Listing>, StoreError> {
            Ok(vec![])
        }
    }

    fn listing(id: &str, make: &str) -> Listing {
        Listing::new(id, make, "308", 2015, 10000.0, 12000.0, "black")
    }

    fn setup() -> (Arc<ListingEventProcessor>, Arc<SlowStore>) {
        let store = Arc::new(SlowStore::default());
        let processor = Arc::new(ListingEventProcessor::new(
            store.clone(),
            Arc::new(ListingCache::default()),
        ));
        (processor, store)
    }

    #[test]
    fn test_config_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());

        let zero_buffer = OrchestratorConfig {
            channel_buffer_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_buffer.validate(),
            Err(PipelineError::ValidationError(_))
        ));

        let zero_concurrency = OrchestratorConfig {
            event_concurrency: 0,
            ..Default::default()
        };
        assert!(zero_concurrency.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_stream_counts_outcomes() {
        let (processor, _store) = setup();
        let (tx, rx) = mpsc::channel(16);

        tx.send(StreamMessage::Events(vec![
            ListingEvent::create(listing("1", "Peugeot")),
            ListingEvent::update(listing("2", "Broken")),
        ]))
        .await
        .unwrap();
        tx.send(StreamMessage::Error("broker hiccup".to_string()))
            .await
            .unwrap();
        tx.send(StreamMessage::Events(vec![
            ListingEvent::delete("1"),
            ListingEvent::new("evt", EventType::Unknown, listing("3", "Fiat")),
        ]))
        .await
        .unwrap();
        tx.send(StreamMessage::End).await.unwrap();

        let stats = process_stream(processor, rx, 4).await;

        assert_eq!(stats.indexed(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.deleted(), 1);
        assert_eq!(stats.ignored(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_stream_bounds_concurrency() {
        let (processor, store) = setup();
        let (tx, rx) = mpsc::channel(16);

        let events = (0..10)
            .map(|i| ListingEvent::create(listing(&i.to_string(), "Peugeot")))
            .collect();
        tx.send(StreamMessage::Events(events)).await.unwrap();
        drop(tx);

        let stats = process_stream(processor, rx, 3).await;

        assert_eq!(stats.indexed(), 10);
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 3);
    }
}
