use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use super::{LedgerStore, PricingStore, ResetSummary};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ActiveListing, ArtistPricingState, DemandSuggestion, EventInventory, SeatPurchaseRecord,
};

#[derive(Default)]
struct Inner {
    events: HashMap<i64, EventInventory>,
    purchases: Vec<SeatPurchaseRecord>,
    sold_keys: HashSet<(String, String)>,
    artists: BTreeMap<i64, ArtistPricingState>,
    suggestions: Vec<DemandSuggestion>,
}

/// Process-local backend. One mutex guards all tables, which makes each trait
/// call a single atomic step.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_batch(
    inner: &Inner,
    event_id: i64,
    records: &[SeatPurchaseRecord],
) -> EngineResult<EventInventory> {
    if records.is_empty() {
        return Err(EngineError::invalid("no seats to reserve"));
    }

    if let Some(stray) = records.iter().find(|r| r.event_id != event_id) {
        return Err(EngineError::invalid(format!(
            "seat {} belongs to event {}, not {}",
            stray.seat_id, stray.event_id, event_id
        )));
    }

    // Capacity first, then seats
    let inventory = inner
        .events
        .get(&event_id)
        .copied()
        .ok_or_else(|| EngineError::NotFound(format!("event {event_id}")))?;
    if inventory.available() < records.len() as i32 {
        return Err(EngineError::EventSoldOut { event_id });
    }

    let mut batch_keys = HashSet::with_capacity(records.len());
    for record in records {
        let key = (record.seat_id.clone(), record.artist_slug.clone());
        if inner.sold_keys.contains(&key) || !batch_keys.insert(key) {
            return Err(EngineError::SeatUnavailable {
                seat_id: record.seat_id.clone(),
                artist_slug: record.artist_slug.clone(),
            });
        }
    }
    Ok(inventory)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn reserve_batch(
        &self,
        event_id: i64,
        records: &[SeatPurchaseRecord],
    ) -> EngineResult<EventInventory> {
        let mut inner = self.inner.lock().await;
        let mut inventory = check_batch(&inner, event_id, records)?;

        inventory.sold_tickets += records.len() as i32;
        inner.events.insert(event_id, inventory);
        for record in records {
            inner
                .sold_keys
                .insert((record.seat_id.clone(), record.artist_slug.clone()));
            inner.purchases.push(record.clone());
        }
        Ok(inventory)
    }

    async fn purchases_by_artist(&self, artist_slug: &str) -> EngineResult<Vec<SeatPurchaseRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .purchases
            .iter()
            .filter(|p| p.artist_slug == artist_slug)
            .cloned()
            .collect())
    }

    async fn is_purchased(&self, seat_id: &str, artist_slug: &str) -> EngineResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sold_keys
            .contains(&(seat_id.to_string(), artist_slug.to_string())))
    }

    async fn total_purchases(&self) -> EngineResult<u64> {
        Ok(self.inner.lock().await.purchases.len() as u64)
    }

    async fn latest_purchase_at(&self) -> EngineResult<Option<DateTime<Utc>>> {
        let inner = self.inner.lock().await;
        Ok(inner.purchases.iter().map(|p| p.purchase_timestamp).max())
    }

    async fn reset_all(&self) -> EngineResult<ResetSummary> {
        let mut inner = self.inner.lock().await;

        let mut per_event: HashMap<i64, i32> = HashMap::new();
        for record in &inner.purchases {
            *per_event.entry(record.event_id).or_default() += 1;
        }
        for (event_id, count) in &per_event {
            if let Some(inventory) = inner.events.get_mut(event_id) {
                inventory.sold_tickets = (inventory.sold_tickets - count).max(0);
            }
        }

        let records_deleted = inner.purchases.len() as u64;
        inner.purchases.clear();
        inner.sold_keys.clear();

        Ok(ResetSummary {
            records_deleted,
            events_restored: per_event.len() as u64,
        })
    }

    async fn event_inventory(&self, event_id: i64) -> EngineResult<Option<EventInventory>> {
        Ok(self.inner.lock().await.events.get(&event_id).copied())
    }

    async fn upsert_event(&self, inventory: EventInventory) -> EngineResult<()> {
        if inventory.sold_tickets < 0 || inventory.sold_tickets > inventory.total_tickets {
            return Err(EngineError::invalid(format!(
                "event {} would hold {} of {} tickets",
                inventory.event_id, inventory.sold_tickets, inventory.total_tickets
            )));
        }
        self.inner
            .lock()
            .await
            .events
            .insert(inventory.event_id, inventory);
        Ok(())
    }
}

#[async_trait]
impl PricingStore for MemoryStore {
    async fn pricing_state(&self, artist_id: i64) -> EngineResult<Option<ArtistPricingState>> {
        Ok(self.inner.lock().await.artists.get(&artist_id).cloned())
    }

    async fn pricing_state_by_slug(&self, artist_slug: &str) -> EngineResult<Option<ArtistPricingState>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .artists
            .values()
            .find(|a| a.artist_slug == artist_slug)
            .cloned())
    }

    async fn upsert_pricing_state(&self, state: ArtistPricingState) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        let slug_taken = inner
            .artists
            .values()
            .any(|a| a.artist_slug == state.artist_slug && a.artist_id != state.artist_id);
        if slug_taken {
            return Err(EngineError::invalid(format!(
                "artist slug {} is already in use",
                state.artist_slug
            )));
        }
        inner.artists.insert(state.artist_id, state);
        Ok(())
    }

    async fn set_uplift(
        &self,
        artist_id: i64,
        uplift: Decimal,
        at: DateTime<Utc>,
    ) -> EngineResult<ArtistPricingState> {
        let mut inner = self.inner.lock().await;
        let state = inner
            .artists
            .get_mut(&artist_id)
            .ok_or_else(|| EngineError::NotFound(format!("artist {artist_id}")))?;
        state.current_uplift = uplift;
        state.last_updated = at;
        Ok(state.clone())
    }

    async fn active_listings(&self) -> EngineResult<Vec<ActiveListing>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .artists
            .values()
            .filter_map(|pricing| {
                let inventory = inner.events.get(&pricing.event_id)?;
                (!inventory.is_sold_out()).then(|| ActiveListing {
                    pricing: pricing.clone(),
                    inventory: *inventory,
                })
            })
            .collect())
    }

    async fn append_suggestion(&self, suggestion: &DemandSuggestion) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.artists.contains_key(&suggestion.pricing_state_id) {
            return Err(EngineError::NotFound(format!(
                "pricing state {}",
                suggestion.pricing_state_id
            )));
        }
        inner.suggestions.push(suggestion.clone());
        Ok(())
    }

    async fn suggestions_for(&self, pricing_state_id: i64) -> EngineResult<Vec<DemandSuggestion>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .suggestions
            .iter()
            .filter(|s| s.pricing_state_id == pricing_state_id)
            .cloned()
            .collect())
    }
}
