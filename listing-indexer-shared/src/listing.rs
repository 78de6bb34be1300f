//! The car listing document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single car listing as stored in the search index.
///
/// Field names serialize in camelCase (`minPrice`, `maxPrice`) so the same
/// representation is used on the event wire, in the index and in responses.
/// Attributes default when absent because DELETE events only carry `id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Listing {
    /// Document identity, externally assigned or generated on create.
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub min_price: f64,
    pub max_price: f64,
    pub color: String,
}

impl Listing {
    /// Create a listing with every attribute set.
    pub fn new(
        id: impl Into<String>,
        make: impl Into<String>,
        model: impl Into<String>,
        year: i32,
        min_price: f64,
        max_price: f64,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            make: make.into(),
            model: model.into(),
            year,
            min_price,
            max_price,
            color: color.into(),
        }
    }

    /// Whether the listing carries a non-blank id.
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Assign a fresh UUID v4 identity and return it.
    pub fn assign_generated_id(&mut self) -> &str {
        self.id = Uuid::new_v4().to_string();
        &self.id
    }
}
