use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::ledger::InventoryLedger;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ArtistPricingState, EventInventory, PurchaseSource, SeatPurchaseRecord, SeatRequest,
};
use crate::pricing::{PriceBreakdown, PricingCalculator};
use crate::store::PricingStore;

/// Hard ceiling for any uplift, independent of the artist's own limit.
pub const UPLIFT_CEILING: Decimal = dec!(200);

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub artist_id: i64,
    pub artist_slug: String,
    pub uplift: Decimal,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub artist_slug: String,
    pub event_id: i64,
    pub breakdown: PriceBreakdown,
    pub total_charged: Decimal,
    pub seats: Vec<SeatPurchaseRecord>,
    pub inventory: EventInventory,
}

/// The storefront side of the engine: quotes, artist overrides and real
/// checkout. Settles with the same calculator the simulation prices with.
#[derive(Clone)]
pub struct CheckoutService {
    ledger: InventoryLedger,
    pricing: Arc<dyn PricingStore>,
    calculator: PricingCalculator,
}

impl CheckoutService {
    pub fn new(ledger: InventoryLedger, pricing: Arc<dyn PricingStore>, calculator: PricingCalculator) -> Self {
        Self {
            ledger,
            pricing,
            calculator,
        }
    }

    pub fn price(&self, face_value: Decimal, uplift_pct: Decimal) -> EngineResult<PriceBreakdown> {
        self.calculator.price(face_value, uplift_pct)
    }

    pub async fn artist(&self, artist_id: i64) -> EngineResult<ArtistPricingState> {
        self.pricing
            .pricing_state(artist_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("artist {artist_id}")))
    }

    pub async fn quote(&self, artist_id: i64) -> EngineResult<Quote> {
        let artist = self.artist(artist_id).await?;
        let breakdown = self.calculator.price(artist.base_price, artist.current_uplift)?;
        Ok(Quote {
            artist_id: artist.artist_id,
            artist_slug: artist.artist_slug,
            uplift: artist.current_uplift,
            breakdown,
        })
    }

    /// Manual artist override. Bypasses the gradual adjuster but not the bounds.
    pub async fn set_uplift(&self, artist_id: i64, uplift_pct: Decimal) -> EngineResult<ArtistPricingState> {
        let artist = self.artist(artist_id).await?;
        let ceiling = artist.max_uplift.min(UPLIFT_CEILING);
        if uplift_pct < Decimal::ZERO || uplift_pct > ceiling {
            return Err(EngineError::invalid(format!(
                "uplift {uplift_pct}% is outside 0..={ceiling} for {}",
                artist.artist_slug
            )));
        }

        let updated = self.pricing.set_uplift(artist_id, uplift_pct, Utc::now()).await?;
        info!(
            artist = %updated.artist_slug,
            from = %artist.current_uplift,
            to = %updated.current_uplift,
            "uplift set by artist"
        );
        Ok(updated)
    }

    /// Settles a real order. Every seat is priced at the artist's current
    /// uplift and the whole order is recorded or none of it is.
    pub async fn record_manual_purchase(
        &self,
        artist_slug: &str,
        seats: Vec<SeatRequest>,
    ) -> EngineResult<PurchaseReceipt> {
        if seats.is_empty() {
            return Err(EngineError::invalid("an order needs at least one seat"));
        }
        let artist = self
            .pricing
            .pricing_state_by_slug(artist_slug)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("artist {artist_slug}")))?;
        let breakdown = self.calculator.price(artist.base_price, artist.current_uplift)?;

        let records: Vec<SeatPurchaseRecord> = seats
            .into_iter()
            .map(|seat| {
                SeatPurchaseRecord::from_request(
                    seat,
                    &artist.artist_slug,
                    artist.event_id,
                    breakdown.total_price,
                    PurchaseSource::Manual,
                )
            })
            .collect();

        let inventory = self.ledger.reserve_batch(artist.event_id, &records).await?;
        let total_charged = breakdown.total_price * Decimal::from(records.len());
        info!(
            artist = %artist.artist_slug,
            seats = records.len(),
            total = %total_charged,
            "manual purchase recorded"
        );

        Ok(PurchaseReceipt {
            artist_slug: artist.artist_slug,
            event_id: artist.event_id,
            breakdown,
            total_charged,
            seats: records,
            inventory,
        })
    }

    pub async fn register_artist(
        &self,
        state: ArtistPricingState,
        inventory: EventInventory,
    ) -> EngineResult<()> {
        if state.event_id != inventory.event_id {
            return Err(EngineError::invalid(format!(
                "artist {} is listed for event {}, not {}",
                state.artist_slug, state.event_id, inventory.event_id
            )));
        }
        if state.base_price < Decimal::ZERO
            || state.current_uplift < Decimal::ZERO
            || state.current_uplift > state.max_uplift
            || state.max_uplift > UPLIFT_CEILING
        {
            return Err(EngineError::invalid(format!(
                "pricing for {} is out of bounds",
                state.artist_slug
            )));
        }
        self.ledger.register_event(inventory).await?;
        self.pricing.upsert_pricing_state(state).await
    }

    /// A small catalog so a fresh in-memory instance has something to sell.
    pub async fn seed_demo_data(&self) -> EngineResult<()> {
        let now = Utc::now();
        let demo = [
            (1, "northern-lights", 101, dec!(100), dec!(25), dec!(200), 2_250),
            (2, "the-quiet-hours", 102, dec!(65), dec!(50), dec!(150), 1_440),
            (3, "basement-choir", 103, dec!(35), dec!(10), dec!(100), 800),
        ];
        for (artist_id, slug, event_id, base_price, uplift, max_uplift, total) in demo {
            self.register_artist(
                ArtistPricingState {
                    artist_id,
                    artist_slug: slug.to_string(),
                    event_id,
                    base_price,
                    current_uplift: uplift,
                    max_uplift,
                    last_updated: now,
                },
                EventInventory::new(event_id, total),
            )
            .await?;
        }
        info!(artists = demo.len(), "demo catalog seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seat(seat_id: &str) -> SeatRequest {
        SeatRequest {
            seat_id: seat_id.to_string(),
            venue_layout: "arena".to_string(),
            section: "floor".to_string(),
            row: 1,
            number: 1,
            ticket_type_id: "premium".to_string(),
        }
    }

    async fn service(total: i32) -> CheckoutService {
        let store = Arc::new(MemoryStore::new());
        let service = CheckoutService::new(
            InventoryLedger::new(store.clone()),
            store,
            PricingCalculator::default(),
        );
        service
            .register_artist(
                ArtistPricingState {
                    artist_id: 1,
                    artist_slug: "band".to_string(),
                    event_id: 10,
                    base_price: dec!(100),
                    current_uplift: dec!(25),
                    max_uplift: dec!(150),
                    last_updated: Utc::now(),
                },
                EventInventory::new(10, total),
            )
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn quote_uses_the_current_uplift() {
        let quote = service(10).await.quote(1).await.unwrap();
        assert_eq!(quote.breakdown.total_price, dec!(129.815));
        assert_eq!(quote.uplift, dec!(25));
    }

    #[tokio::test]
    async fn manual_purchase_settles_at_the_quoted_price() {
        let service = service(10).await;
        let receipt = service
            .record_manual_purchase("band", vec![seat("a-1"), seat("a-2")])
            .await
            .unwrap();
        assert_eq!(receipt.total_charged, dec!(259.630));
        assert_eq!(receipt.inventory.sold_tickets, 2);
        assert!(receipt.seats.iter().all(|s| s.source == PurchaseSource::Manual));
        assert!(receipt.seats.iter().all(|s| s.unit_price == dec!(129.815)));
    }

    #[tokio::test]
    async fn order_with_a_taken_seat_records_nothing() {
        let service = service(10).await;
        service.record_manual_purchase("band", vec![seat("a-1")]).await.unwrap();
        let err = service
            .record_manual_purchase("band", vec![seat("a-2"), seat("a-1")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SeatUnavailable { .. }));
        assert!(!service.ledger.is_purchased("a-2", "band").await.unwrap());
        assert_eq!(service.ledger.total_purchases().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn order_larger_than_remaining_inventory_is_sold_out() {
        let service = service(1).await;
        let err = service
            .record_manual_purchase("band", vec![seat("a-1"), seat("a-2")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EventSoldOut { event_id: 10 }));
    }

    #[tokio::test]
    async fn set_uplift_respects_the_artist_ceiling() {
        let service = service(10).await;
        let updated = service.set_uplift(1, dec!(120)).await.unwrap();
        assert_eq!(updated.current_uplift, dec!(120));
        assert!(service.set_uplift(1, dec!(151)).await.is_err());
        assert!(service.set_uplift(1, dec!(-1)).await.is_err());
        assert!(matches!(
            service.set_uplift(9, dec!(10)).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn demo_catalog_is_listed() {
        let store = Arc::new(MemoryStore::new());
        let service = CheckoutService::new(
            InventoryLedger::new(store.clone()),
            store.clone(),
            PricingCalculator::default(),
        );
        service.seed_demo_data().await.unwrap();
        assert_eq!(store.active_listings().await.unwrap().len(), 3);
    }
}
