//! Dependency initialization and wiring for the listing indexer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::IndexingError;
use listing_indexer_pipeline::{
    consumer::KafkaConsumer, orchestrator::Orchestrator, processor::ListingEventProcessor,
};
use listing_indexer_repository::{
    IndexingGateway, ListingCache, ListingIndexProvider, OpenSearchClient,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Processor shared with the orchestrator; also serves listing queries.
    pub processor: Arc<ListingEventProcessor>,
}

impl Dependencies {
    /// Initialize all dependencies from the given settings.
    ///
    /// An unreachable index is logged and tolerated: the circuit breaker
    /// isolates the pipeline until it recovers.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If a client cannot be constructed
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index = %settings.index.name,
            kafka_broker = %settings.kafka_broker,
            kafka_group_id = %settings.kafka_group_id,
            kafka_topic = %settings.kafka_topic,
            "Initializing dependencies"
        );

        // Initialize OpenSearch client
        let search_client = OpenSearchClient::new(&settings.opensearch_url, settings.index.clone())
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
            })?;

        match search_client.health_check().await {
            Ok(true) => info!("OpenSearch connection verified"),
            Ok(false) => warn!("OpenSearch cluster is unhealthy"),
            Err(e) => warn!(error = %e, "OpenSearch health check failed"),
        }

        if settings.auto_create_index {
            if let Err(e) = search_client.ensure_index_exists().await {
                warn!(error = %e, "Could not ensure listing index exists");
            }
        }

        let cache = Arc::new(ListingCache::new(settings.cache.clone()));
        let gateway = IndexingGateway::with_config(
            Arc::new(search_client),
            cache.clone(),
            settings.circuit_breaker.clone(),
        );

        let processor = Arc::new(ListingEventProcessor::new(Arc::new(gateway), cache));

        // Initialize Kafka consumer
        let consumer = KafkaConsumer::new(
            &settings.kafka_broker,
            &settings.kafka_group_id,
            &settings.kafka_topic,
        )?;

        info!("Kafka consumer created");

        let orchestrator =
            Orchestrator::with_config(consumer, processor.clone(), settings.orchestrator.clone())?;

        Ok(Self {
            orchestrator,
            processor,
        })
    }
}
