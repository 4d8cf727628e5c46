//! Background simulation runner.
//!
//! One scheduler owns at most one timer task. `start` spawns it, `stop`
//! signals it through a watch channel and returns without waiting, so both
//! are safe to call from anywhere, including from inside a tick.

use chrono::{Duration as ChronoDuration, Utc};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::demand::DemandModel;
use super::feedback::{uplift_as_f64, UpliftFeedbackAdjuster};
use super::ledger::InventoryLedger;
use super::seats::{RngSource, SeatGenerator, SimRng};
use crate::config::SimulationConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ActiveListing, PurchaseSource, RunStateSource, SeatPurchaseRecord, SimulationRunState,
};
use crate::pricing::PricingCalculator;
use crate::store::PricingStore;

struct TickContext {
    ledger: InventoryLedger,
    pricing: Arc<dyn PricingStore>,
    model: DemandModel,
    calculator: PricingCalculator,
    adjuster: UpliftFeedbackAdjuster,
    config: SimulationConfig,
    rngs: RngSource,
}

struct RunSlot {
    state: SimulationRunState,
    /// Bumped on every start; a task only writes to the slot while its
    /// generation is current.
    generation: u64,
    cancel: Option<watch::Sender<bool>>,
}

#[derive(Default)]
struct ArtistWindow {
    sold: u32,
    revenue: Decimal,
}

/// Per-run bookkeeping private to the timer task.
struct RunProgress {
    sold_out_events: HashSet<i64>,
    window: HashMap<i64, ArtistWindow>,
    window_started: Instant,
}

impl RunProgress {
    fn new() -> Self {
        Self {
            sold_out_events: HashSet::new(),
            window: HashMap::new(),
            window_started: Instant::now(),
        }
    }
}

#[derive(Clone)]
pub struct SimulationScheduler {
    ctx: Arc<TickContext>,
    slot: Arc<Mutex<RunSlot>>,
    infer_run_state: bool,
}

impl SimulationScheduler {
    pub fn new(
        ledger: InventoryLedger,
        pricing: Arc<dyn PricingStore>,
        model: DemandModel,
        calculator: PricingCalculator,
        adjuster: UpliftFeedbackAdjuster,
        config: SimulationConfig,
    ) -> Self {
        let rngs = RngSource::new(config.seed);
        Self {
            ctx: Arc::new(TickContext {
                ledger,
                pricing,
                model,
                calculator,
                adjuster,
                config,
                rngs,
            }),
            slot: Arc::new(Mutex::new(RunSlot {
                state: SimulationRunState::stopped(),
                generation: 0,
                cancel: None,
            })),
            infer_run_state: true,
        }
    }

    /// Enables or disables inferring a run from recent ledger activity when
    /// this instance has never been started.
    pub fn with_inference(mut self, enabled: bool) -> Self {
        self.infer_run_state = enabled;
        self
    }

    /// Starts ticking at `tickets_per_minute`. A no-op returning the current
    /// state when a run is already in progress.
    pub async fn start(&self, tickets_per_minute: f64) -> EngineResult<SimulationRunState> {
        if !tickets_per_minute.is_finite() || tickets_per_minute <= 0.0 {
            return Err(EngineError::invalid(format!(
                "tickets per minute must be positive, got {tickets_per_minute}"
            )));
        }
        let period = Duration::try_from_secs_f64(60.0 / tickets_per_minute)
            .map_err(|_| EngineError::invalid(format!("rate {tickets_per_minute} is too small")))?
            .max(Duration::from_millis(1));

        let mut slot = self.slot.lock().await;
        if slot.state.is_running {
            debug!("simulation already running, start ignored");
            return Ok(slot.state.clone());
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        slot.generation += 1;
        slot.state = SimulationRunState::running(tickets_per_minute, Utc::now());
        slot.cancel = Some(cancel_tx);

        tokio::spawn(run_loop(
            self.ctx.clone(),
            self.slot.clone(),
            slot.generation,
            period,
            cancel_rx,
        ));

        info!(
            tickets_per_minute,
            interval_ms = period.as_millis() as u64,
            generation = slot.generation,
            "simulation started"
        );
        Ok(slot.state.clone())
    }

    /// Cancels the timer. Idempotent and never waits on the running task.
    pub async fn stop(&self) -> SimulationRunState {
        let mut slot = self.slot.lock().await;
        if let Some(cancel) = slot.cancel.take() {
            let _ = cancel.send(true);
            info!(
                ticks = slot.state.ticks,
                purchases = slot.state.purchases,
                "simulation stopped"
            );
        }
        slot.state = SimulationRunState::stopped();
        slot.state.clone()
    }

    pub async fn get_state(&self) -> EngineResult<SimulationRunState> {
        let (state, generation) = {
            let slot = self.slot.lock().await;
            (slot.state.clone(), slot.generation)
        };
        if state.is_running || generation > 0 || !self.infer_run_state {
            return Ok(state);
        }

        let window = ChronoDuration::seconds(self.ctx.config.activity_window_secs);
        let inferred = match self.ctx.ledger.latest_purchase_at().await? {
            Some(at) if Utc::now() - at <= window => SimulationRunState {
                is_running: true,
                tickets_per_minute: None,
                started_at: None,
                last_activity_at: Some(at),
                ticks: 0,
                purchases: 0,
                source: RunStateSource::Inferred,
            },
            _ => SimulationRunState {
                source: RunStateSource::Inferred,
                ..SimulationRunState::stopped()
            },
        };
        Ok(inferred)
    }
}

async fn run_loop(
    ctx: Arc<TickContext>,
    slot: Arc<Mutex<RunSlot>>,
    generation: u64,
    period: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately
    ticker.tick().await;

    let mut rng = ctx.rngs.next_rng();
    let mut progress = RunProgress::new();
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                ticks += 1;
                let sold = match tick(&ctx, &mut rng, &mut progress).await {
                    Ok(sold) => sold,
                    Err(e) => {
                        warn!(error = %e, "simulation tick failed");
                        0
                    }
                };

                {
                    let mut slot = slot.lock().await;
                    if slot.generation != generation || !slot.state.is_running {
                        break;
                    }
                    slot.state.ticks += 1;
                    slot.state.purchases += u64::from(sold);
                    slot.state.last_activity_at = Some(Utc::now());
                }

                if ticks % ctx.config.feedback_every_ticks.max(1) == 0 {
                    if let Err(e) = feedback_cycle(&ctx, &mut progress).await {
                        warn!(error = %e, "feedback cycle failed");
                    }
                }
            }
        }
    }
    debug!(generation, ticks, "simulation task exited");
}

/// Sells up to a handful of seats for one random active artist and returns
/// how many went through.
async fn tick(ctx: &TickContext, rng: &mut SimRng, progress: &mut RunProgress) -> EngineResult<u32> {
    let listings: Vec<ActiveListing> = ctx
        .pricing
        .active_listings()
        .await?
        .into_iter()
        .filter(|l| !progress.sold_out_events.contains(&l.inventory.event_id))
        .collect();
    let Some(listing) = listings.choose(rng) else {
        debug!("no active listings to simulate");
        return Ok(0);
    };

    let artist = &listing.pricing;
    let breakdown = ctx.calculator.price(artist.base_price, artist.current_uplift)?;
    let price = uplift_as_f64(breakdown.total_price);
    let uplift = uplift_as_f64(artist.current_uplift);
    let generator = SeatGenerator::for_event(artist.event_id);
    let seats = generator.candidates(
        rng,
        ctx.config.min_seats_per_tick,
        ctx.config.max_seats_per_tick,
    );

    let mut sold = 0;
    for seat in seats {
        if ctx.config.persona_gate {
            let persona = ctx.model.personas().sample_weighted(rng);
            if !ctx.model.decide(persona, price, uplift, rng) {
                continue;
            }
        }

        let record = SeatPurchaseRecord::from_request(
            seat,
            &artist.artist_slug,
            artist.event_id,
            breakdown.total_price,
            PurchaseSource::Simulated,
        );
        match ctx.ledger.reserve_and_record(record).await {
            Ok(_) => {
                sold += 1;
                let window = progress.window.entry(artist.artist_id).or_default();
                window.sold += 1;
                window.revenue += breakdown.total_price;
            }
            Err(EngineError::SeatUnavailable { .. }) => continue,
            Err(EngineError::EventSoldOut { event_id }) => {
                info!(artist = %artist.artist_slug, event_id, "event sold out, skipping for this run");
                progress.sold_out_events.insert(event_id);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(sold)
}

/// Turns each artist's sales since the last cycle into a logged suggestion
/// and one gradual uplift step. Listed artists with no sales in the window
/// are assessed too, so weak demand pulls their uplift down.
async fn feedback_cycle(ctx: &TickContext, progress: &mut RunProgress) -> EngineResult<()> {
    let minutes = progress.window_started.elapsed().as_secs_f64() / 60.0;
    let mut window = std::mem::take(&mut progress.window);
    progress.window_started = Instant::now();
    if minutes <= 0.0 {
        return Ok(());
    }
    for listing in ctx.pricing.active_listings().await? {
        window.entry(listing.pricing.artist_id).or_default();
    }

    for (artist_id, sales) in window {
        let suggestion = ctx
            .adjuster
            .suggest(artist_id, sales.sold, minutes, sales.revenue)?;
        ctx.pricing.append_suggestion(&suggestion).await?;
        let (state, adjustment) = ctx.adjuster.steer(ctx.pricing.as_ref(), &suggestion).await?;
        debug!(
            artist = %state.artist_slug,
            sold = sales.sold,
            suggested = %suggestion.suggested_uplift,
            committed = adjustment.committed,
            "feedback cycle applied"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistPricingState, EventInventory, SeatRequest};
    use crate::store::{LedgerStore, MemoryStore};
    use rust_decimal_macros::dec;

    fn scheduler(store: Arc<MemoryStore>) -> SimulationScheduler {
        SimulationScheduler::new(
            InventoryLedger::new(store.clone()),
            store,
            DemandModel::default(),
            PricingCalculator::default(),
            UpliftFeedbackAdjuster::default(),
            SimulationConfig {
                persona_gate: false,
                seed: Some(11),
                ..SimulationConfig::default()
            },
        )
    }

    async fn store_with_artist(total: i32) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.upsert_event(EventInventory::new(5, total)).await.unwrap();
        store
            .upsert_pricing_state(ArtistPricingState {
                artist_id: 1,
                artist_slug: "band".to_string(),
                event_id: 5,
                base_price: dec!(40),
                current_uplift: dec!(20),
                max_uplift: dec!(200),
                last_updated: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn start_rejects_non_positive_rates() {
        let scheduler = scheduler(store_with_artist(10).await);
        assert!(scheduler.start(0.0).await.is_err());
        assert!(scheduler.start(-3.0).await.is_err());
        assert!(scheduler.start(f64::NAN).await.is_err());
        assert!(!scheduler.get_state().await.unwrap().is_running);
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let scheduler = scheduler(store_with_artist(10).await);
        let first = scheduler.start(1.0).await.unwrap();
        let second = scheduler.start(500.0).await.unwrap();
        assert_eq!(first.started_at, second.started_at);
        assert_eq!(second.tickets_per_minute, Some(1.0));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let scheduler = scheduler(store_with_artist(10).await);
        scheduler.stop().await;
        scheduler.start(60.0).await.unwrap();
        let stopped = scheduler.stop().await;
        assert!(!stopped.is_running);
        let again = scheduler.stop().await;
        assert_eq!(again, SimulationRunState::stopped());
    }

    #[tokio::test]
    async fn recent_purchase_infers_a_run() {
        let store = store_with_artist(10).await;
        let ledger = InventoryLedger::new(store.clone());
        ledger
            .reserve_and_record(SeatPurchaseRecord::from_request(
                SeatRequest {
                    seat_id: "stalls-1-1".to_string(),
                    venue_layout: "theatre".to_string(),
                    section: "stalls".to_string(),
                    row: 1,
                    number: 1,
                    ticket_type_id: "premium".to_string(),
                },
                "band",
                5,
                dec!(50),
                PurchaseSource::Simulated,
            ))
            .await
            .unwrap();

        let state = scheduler(store.clone()).get_state().await.unwrap();
        assert!(state.is_running);
        assert_eq!(state.source, RunStateSource::Inferred);

        let state = scheduler(store).with_inference(false).get_state().await.unwrap();
        assert!(!state.is_running);
        assert_eq!(state.source, RunStateSource::Explicit);
    }

    #[tokio::test]
    async fn idle_artists_are_steered_down() {
        let store = store_with_artist(50).await;
        store.set_uplift(1, dec!(200), Utc::now()).await.unwrap();
        let scheduler = scheduler(store.clone());

        let mut progress = RunProgress::new();
        progress.window_started = Instant::now()
            .checked_sub(Duration::from_secs(60))
            .unwrap();
        feedback_cycle(&scheduler.ctx, &mut progress).await.unwrap();

        let suggestions = store.suggestions_for(1).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].tickets_sold, 0);
        assert_eq!(suggestions[0].suggested_uplift, dec!(75));
        let state = store.pricing_state(1).await.unwrap().unwrap();
        assert_eq!(state.current_uplift, dec!(175));
        assert!(progress.window.is_empty());
    }

    #[tokio::test]
    async fn ticks_sell_until_the_event_is_exhausted() {
        let store = store_with_artist(6).await;
        let scheduler = scheduler(store.clone());
        scheduler.start(6_000.0).await.unwrap();

        let mut sold = 0;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sold = store.event_inventory(5).await.unwrap().unwrap().sold_tickets;
            assert!(sold <= 6);
            if sold == 6 {
                break;
            }
        }
        let state = scheduler.stop().await;
        assert!(!state.is_running);
        assert_eq!(sold, 6);
        assert_eq!(store.total_purchases().await.unwrap(), 6);
    }
}
