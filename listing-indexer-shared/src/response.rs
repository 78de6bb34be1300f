//! Outbound result contract for search requests.

use serde::Serialize;

use crate::listing::Listing;

/// Search result handed to the request layer.
///
/// `valid=true` with `data` on success; `valid=false` with `error` when the
/// service is degraded. An empty `data` always means "no matches".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingResponse {
    pub valid: bool,
    pub data: Option<Vec<Listing>>,
    pub error: Option<String>,
}

impl ListingResponse {
    pub fn ok(data: Vec<Listing>) -> Self {
        Self {
            valid: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
