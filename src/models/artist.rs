use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::EventInventory;

/// Pricing owned by an artist. Mutated only by an explicit artist override
/// or by the uplift feedback loop.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ArtistPricingState {
    pub artist_id: i64,
    pub artist_slug: String,
    pub event_id: i64,
    pub base_price: Decimal,
    pub current_uplift: Decimal,
    pub max_uplift: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// An artist whose event still has tickets to sell.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveListing {
    pub pricing: ArtistPricingState,
    pub inventory: EventInventory,
}
