//! Durable-store seam for the engine.
//!
//! Every ledger mutation is a single critical section inside the backend, so
//! callers never read-modify-write counters themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::EngineResult;
use crate::models::{
    ActiveListing, ArtistPricingState, DemandSuggestion, EventInventory, SeatPurchaseRecord,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// What `reset_all` removed and restored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub records_deleted: u64,
    pub events_restored: u64,
}

/// Seat ledger plus event inventory counters.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Records every seat and increments the event's sold count by the same
    /// amount, all-or-nothing. All records must belong to `event_id`.
    ///
    /// Fails with `SeatUnavailable` when any `(seat_id, artist_slug)` pair is
    /// already recorded (or repeated in the batch) and with `EventSoldOut`
    /// when the event cannot absorb the whole batch. Capacity is checked
    /// first, so a full event reports `EventSoldOut` even for a taken seat.
    async fn reserve_batch(
        &self,
        event_id: i64,
        records: &[SeatPurchaseRecord],
    ) -> EngineResult<EventInventory>;

    async fn purchases_by_artist(&self, artist_slug: &str) -> EngineResult<Vec<SeatPurchaseRecord>>;

    async fn is_purchased(&self, seat_id: &str, artist_slug: &str) -> EngineResult<bool>;

    async fn total_purchases(&self) -> EngineResult<u64>;

    async fn latest_purchase_at(&self) -> EngineResult<Option<DateTime<Utc>>>;

    /// Deletes every record and subtracts the matching quantities from each
    /// affected event in one atomic step.
    async fn reset_all(&self) -> EngineResult<ResetSummary>;

    async fn event_inventory(&self, event_id: i64) -> EngineResult<Option<EventInventory>>;

    async fn upsert_event(&self, inventory: EventInventory) -> EngineResult<()>;
}

/// Artist pricing rows plus the append-only suggestion log.
#[async_trait]
pub trait PricingStore: Send + Sync + 'static {
    async fn pricing_state(&self, artist_id: i64) -> EngineResult<Option<ArtistPricingState>>;

    async fn pricing_state_by_slug(&self, artist_slug: &str) -> EngineResult<Option<ArtistPricingState>>;

    async fn upsert_pricing_state(&self, state: ArtistPricingState) -> EngineResult<()>;

    /// Sets the live uplift and stamps `last_updated`.
    async fn set_uplift(
        &self,
        artist_id: i64,
        uplift: Decimal,
        at: DateTime<Utc>,
    ) -> EngineResult<ArtistPricingState>;

    /// Artists whose event still has unsold inventory.
    async fn active_listings(&self) -> EngineResult<Vec<ActiveListing>>;

    async fn append_suggestion(&self, suggestion: &DemandSuggestion) -> EngineResult<()>;

    async fn suggestions_for(&self, pricing_state_id: i64) -> EngineResult<Vec<DemandSuggestion>>;
}
