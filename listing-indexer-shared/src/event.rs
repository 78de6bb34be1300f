//! Inbound mutation events.

use serde::{Deserialize, Serialize};

use crate::listing::Listing;

/// Kind of mutation carried by a [`ListingEvent`].
///
/// Unrecognized kinds deserialize to `Unknown` instead of failing so they
/// can be logged and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

/// A create/update/delete instruction for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEvent {
    /// Event identifier assigned by the producer.
    #[serde(default)]
    pub id: String,
    pub event_type: EventType,
    /// Full listing for CREATE/UPDATE; only `id` is used for DELETE.
    pub car_listing: Listing,
}

impl ListingEvent {
    pub fn new(id: impl Into<String>, event_type: EventType, car_listing: Listing) -> Self {
        Self {
            id: id.into(),
            event_type,
            car_listing,
        }
    }

    pub fn create(car_listing: Listing) -> Self {
        Self::new("", EventType::Create, car_listing)
    }

    pub fn update(car_listing: Listing) -> Self {
        Self::new("", EventType::Update, car_listing)
    }

    pub fn delete(listing_id: impl Into<String>) -> Self {
        let car_listing = Listing {
            id: listing_id.into(),
            ..Default::default()
        };
        Self::new("", EventType::Delete, car_listing)
    }
}
