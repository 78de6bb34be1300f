//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the car listing index.

use std::time::Duration;

use serde_json::{json, Value};

/// The default name of the listing index.
pub const DEFAULT_INDEX_NAME: &str = "car_listings";

/// Default per-request timeout enforced by the transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Listing fields mapped as analysed text. Each carries a `raw` keyword
/// sub-field used for sorting.
pub const TEXT_FIELDS: [&str; 3] = ["make", "model", "color"];

/// Where the listing index lives and how requests to it are bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Name of the index holding listing documents.
    pub name: String,
    /// Timeout applied to every request by the HTTP transport.
    pub request_timeout: Duration,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            request_timeout,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_NAME, DEFAULT_REQUEST_TIMEOUT)
    }
}

/// Get the index settings and mappings for the listing index.
///
/// Field names match the serialized `Listing` document (camelCase).
pub fn get_index_settings() -> Value {
    let raw_keyword = json!({ "raw": { "type": "keyword" } });

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "id": {
                    "type": "keyword"
                },
                "make": {
                    "type": "text",
                    "fields": raw_keyword
                },
                "model": {
                    "type": "text",
                    "fields": raw_keyword
                },
                "year": {
                    "type": "integer"
                },
                "minPrice": {
                    "type": "double"
                },
                "maxPrice": {
                    "type": "double"
                },
                "color": {
                    "type": "text",
                    "fields": raw_keyword
                }
            }
        }
    })
}
