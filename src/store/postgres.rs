use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use tracing::{error, warn};
use uuid::Uuid;

use super::{LedgerStore, PricingStore, ResetSummary};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ActiveListing, ArtistPricingState, DemandSuggestion, EventInventory, PurchaseSource,
    SeatPurchaseRecord,
};

/// Postgres backend. Ledger writes run in a transaction so the seat rows and
/// the sold counter can never disagree.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct SeatRow {
    id: Uuid,
    seat_id: String,
    artist_slug: String,
    event_id: i64,
    venue_layout: String,
    section: String,
    seat_row: i32,
    seat_number: i32,
    ticket_type_id: String,
    unit_price: Decimal,
    source: String,
    purchase_timestamp: DateTime<Utc>,
}

impl TryFrom<SeatRow> for SeatPurchaseRecord {
    type Error = EngineError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let source = PurchaseSource::parse(&row.source)
            .ok_or_else(|| EngineError::Store(format!("unknown purchase source {}", row.source)))?;
        Ok(SeatPurchaseRecord {
            id: row.id,
            seat_id: row.seat_id,
            artist_slug: row.artist_slug,
            event_id: row.event_id,
            venue_layout: row.venue_layout,
            section: row.section,
            row: row.seat_row,
            number: row.seat_number,
            ticket_type_id: row.ticket_type_id,
            unit_price: row.unit_price,
            source,
            purchase_timestamp: row.purchase_timestamp,
        })
    }
}

#[derive(FromRow)]
struct SuggestionRow {
    id: Uuid,
    pricing_state_id: i64,
    suggested_uplift: Decimal,
    reason: String,
    tickets_sold: i32,
    total_revenue: Decimal,
    demand_score: f64,
    created_at: DateTime<Utc>,
}

impl From<SuggestionRow> for DemandSuggestion {
    fn from(row: SuggestionRow) -> Self {
        DemandSuggestion {
            id: row.id,
            pricing_state_id: row.pricing_state_id,
            suggested_uplift: row.suggested_uplift,
            reason: row.reason,
            tickets_sold: row.tickets_sold.max(0) as u32,
            total_revenue: row.total_revenue,
            demand_score: row.demand_score,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ListingRow {
    #[sqlx(flatten)]
    pricing: ArtistPricingState,
    total_tickets: i32,
    sold_tickets: i32,
}

const SEAT_COLUMNS: &str = "id, seat_id, artist_slug, event_id, venue_layout, section, seat_row, \
     seat_number, ticket_type_id, unit_price, source, purchase_timestamp";

const PRICING_COLUMNS: &str =
    "artist_id, artist_slug, event_id, base_price, current_uplift, max_uplift, last_updated";

#[async_trait]
impl LedgerStore for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn reserve_batch(
        &self,
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

        let mut tx = self.db.pool.begin().await?;

        // 1) Lock the event row; capacity is judged before any seat
        let inventory = sqlx::query_as::<_, EventInventory>(
            "SELECT event_id, total_tickets, sold_tickets FROM event_inventory WHERE event_id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(inventory) = inventory else {
            tx.rollback().await?;
            return Err(EngineError::NotFound(format!("event {event_id}")));
        };
        if inventory.available() < records.len() as i32 {
            tx.rollback().await?;
            return Err(EngineError::EventSoldOut { event_id });
        }

        // 2) Seat rows: the unique key decides which concurrent buyer wins
        for record in records {
            let inserted = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO seat_purchases
                    (id, seat_id, artist_slug, event_id, venue_layout, section, seat_row,
                     seat_number, ticket_type_id, unit_price, source, purchase_timestamp)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (seat_id, artist_slug) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(record.id)
            .bind(&record.seat_id)
            .bind(&record.artist_slug)
            .bind(record.event_id)
            .bind(&record.venue_layout)
            .bind(&record.section)
            .bind(record.row)
            .bind(record.number)
            .bind(&record.ticket_type_id)
            .bind(record.unit_price)
            .bind(record.source.as_str())
            .bind(record.purchase_timestamp)
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_none() {
                tx.rollback().await?;
                return Err(EngineError::SeatUnavailable {
                    seat_id: record.seat_id.clone(),
                    artist_slug: record.artist_slug.clone(),
                });
            }
        }

        // 3) Conditional increment, never past total_tickets
        let updated = sqlx::query_as::<_, EventInventory>(
            r#"
            UPDATE event_inventory
            SET sold_tickets = sold_tickets + $2
            WHERE event_id = $1 AND sold_tickets + $2 <= total_tickets
            RETURNING event_id, total_tickets, sold_tickets
            "#,
        )
        .bind(event_id)
        .bind(records.len() as i32)
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(inventory) => {
                tx.commit().await?;
                Ok(inventory)
            }
            None => {
                tx.rollback().await?;
                Err(EngineError::EventSoldOut { event_id })
            }
        }
    }

    async fn purchases_by_artist(&self, artist_slug: &str) -> EngineResult<Vec<SeatPurchaseRecord>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seat_purchases WHERE artist_slug = $1 ORDER BY purchase_timestamp"
        ))
        .bind(artist_slug)
        .fetch_all(&self.db.pool)
        .await?;

        rows.into_iter().map(SeatPurchaseRecord::try_from).collect()
    }

    async fn is_purchased(&self, seat_id: &str, artist_slug: &str) -> EngineResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM seat_purchases WHERE seat_id = $1 AND artist_slug = $2)",
        )
        .bind(seat_id)
        .bind(artist_slug)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(exists)
    }

    async fn total_purchases(&self) -> EngineResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seat_purchases")
            .fetch_one(&self.db.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn latest_purchase_at(&self) -> EngineResult<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(purchase_timestamp) FROM seat_purchases",
        )
        .fetch_one(&self.db.pool)
        .await?;
        Ok(latest)
    }

    async fn reset_all(&self) -> EngineResult<ResetSummary> {
        let mut tx = self.db.pool.begin().await?;

        // Counts come from the rows this statement actually removed
        let counts: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            WITH deleted AS (DELETE FROM seat_purchases RETURNING event_id)
            SELECT event_id, COUNT(*) FROM deleted GROUP BY event_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        for (event_id, count) in &counts {
            let restored = sqlx::query(
                "UPDATE event_inventory SET sold_tickets = GREATEST(sold_tickets - $2, 0) WHERE event_id = $1",
            )
            .bind(*event_id)
            .bind(*count as i32)
            .execute(&mut *tx)
            .await?;

            if restored.rows_affected() == 0 {
                warn!(event_id = *event_id, "reset found purchases for an event without inventory");
            }
        }

        if let Err(e) = tx.commit().await {
            error!("reset_all commit failed: {:?}", e);
            return Err(e.into());
        }

        Ok(ResetSummary {
            records_deleted: counts.iter().map(|(_, count)| *count as u64).sum(),
            events_restored: counts.len() as u64,
        })
    }

    async fn event_inventory(&self, event_id: i64) -> EngineResult<Option<EventInventory>> {
        let inventory = sqlx::query_as::<_, EventInventory>(
            "SELECT event_id, total_tickets, sold_tickets FROM event_inventory WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(inventory)
    }

    async fn upsert_event(&self, inventory: EventInventory) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO event_inventory (event_id, total_tickets, sold_tickets)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id)
            DO UPDATE SET total_tickets = EXCLUDED.total_tickets, sold_tickets = EXCLUDED.sold_tickets
            "#,
        )
        .bind(inventory.event_id)
        .bind(inventory.total_tickets)
        .bind(inventory.sold_tickets)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PricingStore for PgStore {
    async fn pricing_state(&self, artist_id: i64) -> EngineResult<Option<ArtistPricingState>> {
        let state = sqlx::query_as::<_, ArtistPricingState>(&format!(
            "SELECT {PRICING_COLUMNS} FROM artist_pricing WHERE artist_id = $1"
        ))
        .bind(artist_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(state)
    }

    async fn pricing_state_by_slug(&self, artist_slug: &str) -> EngineResult<Option<ArtistPricingState>> {
        let state = sqlx::query_as::<_, ArtistPricingState>(&format!(
            "SELECT {PRICING_COLUMNS} FROM artist_pricing WHERE artist_slug = $1"
        ))
        .bind(artist_slug)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(state)
    }

    async fn upsert_pricing_state(&self, state: ArtistPricingState) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO artist_pricing
                (artist_id, artist_slug, event_id, base_price, current_uplift, max_uplift, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (artist_id) DO UPDATE SET
                artist_slug = EXCLUDED.artist_slug,
                event_id = EXCLUDED.event_id,
                base_price = EXCLUDED.base_price,
                current_uplift = EXCLUDED.current_uplift,
                max_uplift = EXCLUDED.max_uplift,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(state.artist_id)
        .bind(&state.artist_slug)
        .bind(state.event_id)
        .bind(state.base_price)
        .bind(state.current_uplift)
        .bind(state.max_uplift)
        .bind(state.last_updated)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn set_uplift(
        &self,
        artist_id: i64,
        uplift: Decimal,
        at: DateTime<Utc>,
    ) -> EngineResult<ArtistPricingState> {
        sqlx::query_as::<_, ArtistPricingState>(&format!(
            "UPDATE artist_pricing SET current_uplift = $2, last_updated = $3 \
             WHERE artist_id = $1 RETURNING {PRICING_COLUMNS}"
        ))
        .bind(artist_id)
        .bind(uplift)
        .bind(at)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("artist {artist_id}")))
    }

    async fn active_listings(&self) -> EngineResult<Vec<ActiveListing>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT a.artist_id, a.artist_slug, a.event_id, a.base_price, a.current_uplift,
                   a.max_uplift, a.last_updated, e.total_tickets, e.sold_tickets
            FROM artist_pricing a
            JOIN event_inventory e ON e.event_id = a.event_id
            WHERE e.sold_tickets < e.total_tickets
            ORDER BY a.artist_id
            "#,
        )
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ActiveListing {
                inventory: EventInventory {
                    event_id: row.pricing.event_id,
                    total_tickets: row.total_tickets,
                    sold_tickets: row.sold_tickets,
                },
                pricing: row.pricing,
            })
            .collect())
    }

    async fn append_suggestion(&self, suggestion: &DemandSuggestion) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO demand_suggestions
                (id, pricing_state_id, suggested_uplift, reason, tickets_sold, total_revenue,
                 demand_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(suggestion.id)
        .bind(suggestion.pricing_state_id)
        .bind(suggestion.suggested_uplift)
        .bind(&suggestion.reason)
        .bind(suggestion.tickets_sold as i32)
        .bind(suggestion.total_revenue)
        .bind(suggestion.demand_score)
        .bind(suggestion.created_at)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn suggestions_for(&self, pricing_state_id: i64) -> EngineResult<Vec<DemandSuggestion>> {
        let rows = sqlx::query_as::<_, SuggestionRow>(
            r#"
            SELECT id, pricing_state_id, suggested_uplift, reason, tickets_sold, total_revenue,
                   demand_score, created_at
            FROM demand_suggestions
            WHERE pricing_state_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(pricing_state_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(DemandSuggestion::from).collect())
    }
}
