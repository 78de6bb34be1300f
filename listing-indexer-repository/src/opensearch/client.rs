//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `ListingIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::Refresh,
    DeleteParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::ListingIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::opensearch::queries::build_search_query;
use listing_indexer_shared::{Listing, PageRequest, SearchCriteria};

/// Marker OpenSearch puts in the body of a 404 caused by a missing index.
const INDEX_NOT_FOUND_MARKER: &str = "index_not_found_exception";

/// Writes return only after the next refresh makes them searchable, so a
/// query issued after the cache flush cannot read pre-write data.
const WRITE_REFRESH: Refresh = Refresh::WaitFor;

/// OpenSearch client implementation.
///
/// Listings are stored as documents whose `_id` is the listing id, so
/// indexing the same listing twice replaces it.
///
/// # Example
///
/// ```ignore
/// use listing_indexer_repository::opensearch::IndexConfig;
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::default()).await?;
///
/// let listing = Listing::new("1", "Peugeot", "308", 2015, 10000.0, 12000.0, "black");
/// client.index_listing(&listing).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index name and request timeout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(index_config.request_timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            index = %index_config.name,
            timeout_ms = index_config.request_timeout.as_millis() as u64,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_config.name
    }

    /// Map a non-success status to an error, telling a missing index apart
    /// from other failures.
    fn status_error(index: &str, status: u16, body: String) -> SearchIndexError {
        if Self::is_index_missing(status, &body) {
            SearchIndexError::index_not_found(index)
        } else {
            SearchIndexError::response(status, body)
        }
    }

    fn is_index_missing(status: u16, body: &str) -> bool {
        status == 404 && body.contains(INDEX_NOT_FOUND_MARKER)
    }

    /// Read the body of a failed response and turn it into an error.
    async fn failed_response(&self, response: Response, operation: &str) -> SearchIndexError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        let err = Self::status_error(&self.index_config.name, status, body);
        if !err.is_index_absent() {
            error!(status, operation, error = %err, "OpenSearch request failed");
        }
        err
    }

    /// Parse a search hit into a listing.
    ///
    /// The document `_id` fills in the listing id when the source lacks one.
    fn parse_hit(hit: &Value) -> Option<Listing> {
        let source = hit.get("_source")?;
        let mut listing: Listing = serde_json::from_value(source.clone()).ok()?;

        if !listing.has_id() {
            listing.id = hit.get("_id")?.as_str()?.to_string();
        }

        Some(listing)
    }

    fn parse_hits(body: &Value) -> Result<Vec<Listing>, SearchIndexError> {
        let hits = body["hits"]["hits"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("Search response has no hits array"))?;

        Ok(hits
            .iter()
            .filter_map(|hit| {
                let listing = Self::parse_hit(hit);
                if listing.is_none() {
                    warn!(
                        document_id = hit["_id"].as_str().unwrap_or_default(),
                        "Skipping search hit that is not a valid listing"
                    );
                }
                listing
            })
            .collect())
    }
}

/// Transport failures: timeouts are told apart from other I/O errors.
fn transport_error(err: opensearch::Error) -> SearchIndexError {
    if err.is_timeout() {
        SearchIndexError::timeout(err.to_string())
    } else {
        SearchIndexError::connection(err.to_string())
    }
}

#[async_trait]
impl ListingIndexProvider for OpenSearchClient {
    #[instrument(skip(self, listing), fields(listing_id = %listing.id))]
    async fn index_listing(&self, listing: &Listing) -> Result<(), SearchIndexError> {
        if !listing.has_id() {
            return Err(SearchIndexError::validation("Listing id is required"));
        }

        let body = serde_json::to_value(listing)
            .map_err(|e| SearchIndexError::serialization(e.to_string()))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index_config.name, &listing.id))
            .refresh(WRITE_REFRESH)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Err(self.failed_response(response, "index").await);
        }

        debug!("Listing document indexed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_listing(&self, id: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.index_config.name, id))
            .refresh(WRITE_REFRESH)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status.is_success() {
            debug!("Listing document deleted");
            return Ok(());
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();

        // A 404 for the document alone means it is already gone.
        if code == 404 && !Self::is_index_missing(code, &body) {
            debug!("Listing document was not present");
            return Ok(());
        }

        let err = Self::status_error(&self.index_config.name, code, body);
        if !err.is_index_absent() {
            error!(status = code, error = %err, "Delete request failed");
        }
        Err(err)
    }

    #[instrument(skip(self, criteria, page))]
    async fn search(
        &self,
        criteria: &SearchCriteria,
        page: &PageRequest,
    ) -> Result<Vec<Listing>, SearchIndexError> {
        let query = build_search_query(criteria, page);
        debug!(query = %query, "Executing listing search");

        let response = self
            .client
            .search(SearchParts::Index(&[self.index_config.name.as_str()]))
            .body(query)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Err(self.failed_response(response, "search").await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Self::parse_hits(&body)
    }

    #[instrument(skip(self))]
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let index = self.index_config.name.as_str();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        if exists.status_code().is_success() {
            debug!(index = %index, "Listing index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(get_index_settings())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Another instance may have created it in the meantime.
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            error!(status = %status, body = %body, "Failed to create listing index");
            return Err(SearchIndexError::response(status.as_u16(), body));
        }

        info!(index = %index, "Created listing index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(matches!(body["status"].as_str(), Some("green") | Some("yellow")))
    }
}
