use chrono::{DateTime, Utc};
use std::slice;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{EventInventory, SeatPurchaseRecord};
use crate::store::{LedgerStore, ResetSummary};

/// Dedup-safe seat ledger shared by the scheduler, simulated batches and
/// real checkout. All invariants live in the store's atomic operations.
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn LedgerStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend_tag()
    }

    /// Records one sold seat and consumes one unit of its event's inventory.
    pub async fn reserve_and_record(&self, record: SeatPurchaseRecord) -> EngineResult<EventInventory> {
        self.reserve_batch(record.event_id, slice::from_ref(&record)).await
    }

    /// Records several seats for one event, all or none.
    pub async fn reserve_batch(
        &self,
        event_id: i64,
        records: &[SeatPurchaseRecord],
    ) -> EngineResult<EventInventory> {
        match self.store.reserve_batch(event_id, records).await {
            Ok(inventory) => {
                debug!(
                    event_id,
                    seats = records.len(),
                    sold = inventory.sold_tickets,
                    total = inventory.total_tickets,
                    "seats recorded"
                );
                Ok(inventory)
            }
            Err(e @ EngineError::SeatUnavailable { .. }) => {
                debug!(event_id, error = %e, "seat already sold");
                Err(e)
            }
            Err(e @ EngineError::EventSoldOut { .. }) => {
                info!(event_id, "event sold out");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn query_by_artist(&self, artist_slug: &str) -> EngineResult<Vec<SeatPurchaseRecord>> {
        self.store.purchases_by_artist(artist_slug).await
    }

    pub async fn is_purchased(&self, seat_id: &str, artist_slug: &str) -> EngineResult<bool> {
        self.store.is_purchased(seat_id, artist_slug).await
    }

    pub async fn total_purchases(&self) -> EngineResult<u64> {
        self.store.total_purchases().await
    }

    pub async fn latest_purchase_at(&self) -> EngineResult<Option<DateTime<Utc>>> {
        self.store.latest_purchase_at().await
    }

    pub async fn event_inventory(&self, event_id: i64) -> EngineResult<Option<EventInventory>> {
        self.store.event_inventory(event_id).await
    }

    pub async fn register_event(&self, inventory: EventInventory) -> EngineResult<()> {
        self.store.upsert_event(inventory).await
    }

    /// Removes every purchase and hands the seats back to their events.
    pub async fn reset_all(&self) -> EngineResult<ResetSummary> {
        warn!(backend = self.backend(), "RESET: deleting all seat purchases");
        let summary = self.store.reset_all().await?;
        warn!(
            records_deleted = summary.records_deleted,
            events_restored = summary.events_restored,
            "RESET: inventory restored"
        );
        Ok(summary)
    }
}
