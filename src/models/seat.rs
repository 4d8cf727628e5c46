use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    Simulated,
    Manual,
}

impl PurchaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseSource::Simulated => "simulated",
            PurchaseSource::Manual => "manual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "simulated" => Some(PurchaseSource::Simulated),
            "manual" => Some(PurchaseSource::Manual),
            _ => None,
        }
    }
}

/// A seat picked by a buyer before it is priced and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRequest {
    pub seat_id: String,
    pub venue_layout: String,
    pub section: String,
    pub row: i32,
    pub number: i32,
    pub ticket_type_id: String,
}

/// One sold seat. `(seat_id, artist_slug)` is unique across the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatPurchaseRecord {
    pub id: Uuid,
    pub seat_id: String,
    pub artist_slug: String,
    pub event_id: i64,
    pub venue_layout: String,
    pub section: String,
    pub row: i32,
    pub number: i32,
    pub ticket_type_id: String,
    /// Total price the seat was settled at, fees included.
    pub unit_price: Decimal,
    pub source: PurchaseSource,
    pub purchase_timestamp: DateTime<Utc>,
}

impl SeatPurchaseRecord {
    pub fn from_request(
        request: SeatRequest,
        artist_slug: &str,
        event_id: i64,
        unit_price: Decimal,
        source: PurchaseSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            seat_id: request.seat_id,
            artist_slug: artist_slug.to_string(),
            event_id,
            venue_layout: request.venue_layout,
            section: request.section,
            row: request.row,
            number: request.number,
            ticket_type_id: request.ticket_type_id,
            unit_price,
            source,
            purchase_timestamp: Utc::now(),
        }
    }
}
