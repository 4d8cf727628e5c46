//! Stochastic buyer model and batch simulation.
//!
//! `DemandModel` is the pure part: the per-buyer purchase decision and the
//! uplift-dependent arrival rate. `DemandSimulator` runs a batch of decisions
//! against the live ledger and logs one suggestion per batch.

use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::feedback::{uplift_as_f64, UpliftFeedbackAdjuster};
use super::ledger::InventoryLedger;
use super::seats::{SeatGenerator, SimRng};
use crate::config::DemandConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{ArtistPricingState, DemandSuggestion, PurchaseSource, SeatPurchaseRecord};
use crate::personas::{Persona, PersonaModel};
use crate::pricing::PricingCalculator;
use crate::store::PricingStore;

#[derive(Debug, Clone)]
pub struct DemandModel {
    config: DemandConfig,
    personas: PersonaModel,
}

impl Default for DemandModel {
    fn default() -> Self {
        Self::new(DemandConfig::default(), PersonaModel::default())
    }
}

impl DemandModel {
    pub fn new(mut config: DemandConfig, personas: PersonaModel) -> Self {
        config
            .suppression_bands
            .sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        Self { config, personas }
    }

    pub fn config(&self) -> &DemandConfig {
        &self.config
    }

    pub fn personas(&self) -> &PersonaModel {
        &self.personas
    }

    /// Purchase intent before noise: base probability, plus the charity
    /// bonus, minus the penalty for pricing above the persona's threshold.
    pub fn willingness(&self, persona: &Persona, total_price: f64, uplift_pct: f64) -> f64 {
        let c = &self.config;
        let charity_bonus = (uplift_pct / c.charity_divisor) * persona.charity_motivation * c.charity_weight;

        let price_threshold = c.price_reference * (1.0 - persona.price_elasticity);
        let penalty = if total_price > price_threshold {
            // a fully elastic persona has a zero threshold and never buys above it
            if price_threshold <= 0.0 {
                f64::INFINITY
            } else {
                ((total_price - price_threshold) / price_threshold)
                    * persona.price_elasticity
                    * c.penalty_weight
            }
        } else {
            0.0
        };

        persona.base_probability + charity_bonus - penalty
    }

    pub fn decide<R: Rng + ?Sized>(
        &self,
        persona: &Persona,
        total_price: f64,
        uplift_pct: f64,
        rng: &mut R,
    ) -> bool {
        let amplitude = self.config.noise_amplitude;
        let noise = if amplitude > 0.0 {
            rng.gen_range(-amplitude..amplitude)
        } else {
            0.0
        };
        let willingness = (self.willingness(persona, total_price, uplift_pct) + noise).clamp(0.0, 1.0);
        rng.gen::<f64>() < willingness
    }

    /// Multiplier of the highest suppression band the uplift has reached.
    pub fn suppression(&self, uplift_pct: f64) -> f64 {
        self.config
            .suppression_bands
            .iter()
            .rev()
            .find(|band| uplift_pct >= band.threshold)
            .map(|band| band.multiplier)
            .unwrap_or(1.0)
    }

    /// Expected buyer arrivals per minute at this uplift.
    pub fn demand_rate(&self, uplift_pct: f64) -> f64 {
        self.config.base_rate_per_minute * self.suppression(uplift_pct)
    }

    /// How many buyer decisions a batch gets: bounded by arrivals, remaining
    /// inventory and the available persona samples.
    pub fn planned_purchases(&self, uplift_pct: f64, duration_minutes: f64, available_tickets: i32) -> u32 {
        let arrivals = (self.demand_rate(uplift_pct) * duration_minutes).floor().max(0.0);
        let arrivals = if arrivals >= u32::MAX as f64 { u32::MAX } else { arrivals as u32 };
        arrivals
            .min(available_tickets.max(0) as u32)
            .min(self.config.max_samples_per_batch)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub artist_id: i64,
    pub event_id: i64,
    pub uplift: Decimal,
    pub unit_price: Decimal,
    pub demand_rate: f64,
    pub planned: u32,
    pub declined: u32,
    pub sold: u32,
    pub seat_conflicts: u32,
    pub sold_out: bool,
    pub total_revenue: Decimal,
    pub suggestion: DemandSuggestion,
}

#[derive(Clone)]
pub struct DemandSimulator {
    model: DemandModel,
    calculator: PricingCalculator,
    ledger: InventoryLedger,
    pricing: Arc<dyn PricingStore>,
    adjuster: UpliftFeedbackAdjuster,
    seat_attempts: u32,
}

impl DemandSimulator {
    pub fn new(
        model: DemandModel,
        calculator: PricingCalculator,
        ledger: InventoryLedger,
        pricing: Arc<dyn PricingStore>,
        adjuster: UpliftFeedbackAdjuster,
        seat_attempts: u32,
    ) -> Self {
        Self {
            model,
            calculator,
            ledger,
            pricing,
            adjuster,
            seat_attempts: seat_attempts.max(1),
        }
    }

    pub fn model(&self) -> &DemandModel {
        &self.model
    }

    /// Simulates `duration_minutes` of buyers for one artist at the artist's
    /// current price. Stops early when the event sells out and always logs a
    /// suggestion built from the purchases actually made.
    pub async fn simulate_batch(
        &self,
        artist_id: i64,
        duration_minutes: f64,
        rng: &mut SimRng,
    ) -> EngineResult<BatchOutcome> {
        if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
            return Err(EngineError::invalid(format!(
                "batch duration must be positive, got {duration_minutes}"
            )));
        }

        let artist = self
            .pricing
            .pricing_state(artist_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("artist {artist_id}")))?;
        let event = self
            .ledger
            .event_inventory(artist.event_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("event {}", artist.event_id)))?;

        let uplift = uplift_as_f64(artist.current_uplift);
        let breakdown = self.calculator.price(artist.base_price, artist.current_uplift)?;
        let total_price = uplift_as_f64(breakdown.total_price);
        let planned = self
            .model
            .planned_purchases(uplift, duration_minutes, event.available());
        let generator = SeatGenerator::for_event(event.event_id);

        let mut declined = 0;
        let mut sold = 0;
        let mut seat_conflicts = 0;
        let mut sold_out = false;
        let mut total_revenue = Decimal::ZERO;

        for _ in 0..planned {
            let persona = self.model.personas().sample(rng);
            if !self.model.decide(persona, total_price, uplift, rng) {
                declined += 1;
                continue;
            }

            match self.sell_one(&artist, &generator, breakdown.total_price, rng).await {
                Ok(()) => {
                    sold += 1;
                    total_revenue += breakdown.total_price;
                }
                Err(EngineError::SeatUnavailable { .. }) => seat_conflicts += 1,
                Err(EngineError::EventSoldOut { .. }) => {
                    sold_out = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let suggestion = self
            .adjuster
            .suggest(artist.artist_id, sold, duration_minutes, total_revenue)?;
        self.pricing.append_suggestion(&suggestion).await?;

        info!(
            artist = %artist.artist_slug,
            planned,
            sold,
            declined,
            sold_out,
            suggested_uplift = %suggestion.suggested_uplift,
            "simulation batch finished"
        );

        Ok(BatchOutcome {
            artist_id: artist.artist_id,
            event_id: event.event_id,
            uplift: artist.current_uplift,
            unit_price: breakdown.total_price,
            demand_rate: self.model.demand_rate(uplift),
            planned,
            declined,
            sold,
            seat_conflicts,
            sold_out,
            total_revenue,
            suggestion,
        })
    }

    /// Tries a few random seats until one is free.
    async fn sell_one(
        &self,
        artist: &ArtistPricingState,
        generator: &SeatGenerator,
        unit_price: Decimal,
        rng: &mut SimRng,
    ) -> EngineResult<()> {
        let mut last_err = None;
        for _ in 0..self.seat_attempts {
            let record = SeatPurchaseRecord::from_request(
                generator.candidate(rng),
                &artist.artist_slug,
                artist.event_id,
                unit_price,
                PurchaseSource::Simulated,
            );
            match self.ledger.reserve_and_record(record).await {
                Ok(_) => return Ok(()),
                Err(e @ EngineError::SeatUnavailable { .. }) => {
                    debug!(artist = %artist.artist_slug, "seat taken, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| EngineError::invalid("no seat attempts configured")))
    }
}
