//! Search criteria and the cache key built from them.

use std::hash::{Hash, Hasher};

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::PageRequest;

/// A query parameter rejected at the request boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Year outside `1..=current year`.
    #[error("Invalid year {year}: must be positive and not after {current_year}")]
    InvalidYear { year: i32, current_year: i32 },

    /// Negative price filter.
    #[error("Invalid {field}: {value} must not be negative")]
    NegativePrice { field: &'static str, value: f64 },
}

/// Optional equality filters over listing attributes.
///
/// Absent fields do not filter; present fields are combined with AND.
/// Equality and hashing are structural so identical criteria produce the
/// same cache key. Prices compare by bit pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub color: Option<String>,
}

impl SearchCriteria {
    /// Criteria that match every listing.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_make(mut self, make: impl Into<String>) -> Self {
        self.make = Some(make.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_min_price(mut self, min_price: f64) -> Self {
        self.min_price = Some(min_price);
        self
    }

    pub fn with_max_price(mut self, max_price: f64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Check if no filter is set.
    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.color.is_none()
    }

    /// Validate the criteria the way the request boundary does.
    ///
    /// `year` must satisfy `0 < year <= current year`; prices must not be
    /// negative. The indexing core does not call this itself.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(year) = self.year {
            validate_year(year, Utc::now().year())?;
        }
        if let Some(value) = self.min_price {
            if value < 0.0 {
                return Err(ValidationError::NegativePrice {
                    field: "minPrice",
                    value,
                });
            }
        }
        if let Some(value) = self.max_price {
            if value < 0.0 {
                return Err(ValidationError::NegativePrice {
                    field: "maxPrice",
                    value,
                });
            }
        }
        Ok(())
    }

    fn price_bits(&self) -> (Option<u64>, Option<u64>) {
        (
            self.min_price.map(f64::to_bits),
            self.max_price.map(f64::to_bits),
        )
    }
}

fn validate_year(year: i32, current_year: i32) -> Result<(), ValidationError> {
    if year > 0 && year <= current_year {
        Ok(())
    } else {
        Err(ValidationError::InvalidYear { year, current_year })
    }
}

impl PartialEq for SearchCriteria {
    fn eq(&self, other: &Self) -> bool {
        self.make == other.make
            && self.model == other.model
            && self.year == other.year
            && self.price_bits() == other.price_bits()
            && self.color == other.color
    }
}

impl Eq for SearchCriteria {}

impl Hash for SearchCriteria {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.make.hash(state);
        self.model.hash(state);
        self.year.hash(state);
        self.price_bits().hash(state);
        self.color.hash(state);
    }
}

/// Cache key for a query result: the criteria plus the requested page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub criteria: SearchCriteria,
    pub page: PageRequest,
}

impl QueryKey {
    pub fn new(criteria: SearchCriteria, page: PageRequest) -> Self {
        Self { criteria, page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let a = SearchCriteria::any().with_make("Peugeot").with_min_price(10000.0);
        let b = SearchCriteria::any().with_make("Peugeot").with_min_price(10000.0);
        let c = SearchCriteria::any().with_make("Peugeot").with_min_price(10000.5);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn test_query_key_includes_page() {
        let criteria = SearchCriteria::any().with_color("black");
        let first = QueryKey::new(criteria.clone(), PageRequest::of(0, 20));
        let second = QueryKey::new(criteria, PageRequest::of(1, 20));

        assert_ne!(first, second);
    }

    #[test]
    fn test_is_empty() {
        assert!(SearchCriteria::any().is_empty());
        assert!(!SearchCriteria::any().with_year(2015).is_empty());
    }

    #[test]
    fn test_validate_year_bounds() {
        assert!(validate_year(2015, 2024).is_ok());
        assert!(validate_year(2024, 2024).is_ok());
        assert!(matches!(
            validate_year(0, 2024),
            Err(ValidationError::InvalidYear { year: 0, .. })
        ));
        assert!(validate_year(-3, 2024).is_err());
        assert!(validate_year(2025, 2024).is_err());
    }

    #[test]
    fn test_validate_criteria() {
        assert!(SearchCriteria::any().validate().is_ok());
        assert!(SearchCriteria::any().with_year(2015).validate().is_ok());
        assert!(SearchCriteria::any().with_year(0).validate().is_err());
        assert!(SearchCriteria::any()
            .with_year(Utc::now().year() + 1)
            .validate()
            .is_err());
        assert!(matches!(
            SearchCriteria::any().with_max_price(-1.0).validate(),
            Err(ValidationError::NegativePrice {
                field: "maxPrice",
                ..
            })
        ));
    }
}
