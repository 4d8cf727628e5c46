//! Turns observed sales velocity into a suggested uplift and steers the live
//! uplift toward it a fraction at a time.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::FeedbackConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{ArtistPricingState, DemandSuggestion};
use crate::store::PricingStore;

/// Demand-score bands, highest first: (score strictly above, uplift, rationale).
const BANDS: [(f64, Decimal, &str); 4] = [
    (80.0, dec!(175), "Very high demand: buyers absorb a large charity uplift"),
    (60.0, dec!(150), "High demand: room to raise the charity uplift"),
    (40.0, dec!(125), "Healthy demand: a moderate increase is sustainable"),
    (20.0, dec!(100), "Steady demand: hold the uplift near its midpoint"),
];
const FLOOR_UPLIFT: Decimal = dec!(75);
const FLOOR_REASON: &str = "Low demand: ease the uplift to win back buyers";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandAssessment {
    pub purchases_per_minute: f64,
    pub demand_score: f64,
    pub suggested_uplift: Decimal,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpliftAdjustment {
    pub previous: Decimal,
    pub target: Decimal,
    pub adjustment: Decimal,
    pub new_uplift: Decimal,
    pub committed: bool,
}

#[derive(Debug, Clone)]
pub struct UpliftFeedbackAdjuster {
    config: FeedbackConfig,
}

impl Default for UpliftFeedbackAdjuster {
    fn default() -> Self {
        Self::new(FeedbackConfig::default())
    }
}

impl UpliftFeedbackAdjuster {
    pub fn new(config: FeedbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    pub fn assess(&self, tickets_sold: u32, minutes_elapsed: f64) -> EngineResult<DemandAssessment> {
        if !minutes_elapsed.is_finite() || minutes_elapsed <= 0.0 {
            return Err(EngineError::invalid(format!(
                "elapsed minutes must be positive, got {minutes_elapsed}"
            )));
        }

        let purchases_per_minute = tickets_sold as f64 / minutes_elapsed;
        let demand_score = (purchases_per_minute * self.config.score_per_purchase_rate).min(100.0);
        let (suggested_uplift, reason) = BANDS
            .iter()
            .find(|(above, _, _)| demand_score > *above)
            .map(|(_, uplift, reason)| (*uplift, *reason))
            .unwrap_or((FLOOR_UPLIFT, FLOOR_REASON));

        Ok(DemandAssessment {
            purchases_per_minute,
            demand_score,
            suggested_uplift,
            reason,
        })
    }

    /// Builds the suggestion log entry for one batch of observed sales.
    pub fn suggest(
        &self,
        pricing_state_id: i64,
        tickets_sold: u32,
        minutes_elapsed: f64,
        total_revenue: Decimal,
    ) -> EngineResult<DemandSuggestion> {
        let assessment = self.assess(tickets_sold, minutes_elapsed)?;
        Ok(DemandSuggestion {
            id: Uuid::new_v4(),
            pricing_state_id,
            suggested_uplift: assessment.suggested_uplift,
            reason: assessment.reason.to_string(),
            tickets_sold,
            total_revenue,
            demand_score: assessment.demand_score,
            created_at: Utc::now(),
        })
    }

    /// One low-pass step from `current` toward `suggested` using the configured step.
    pub fn apply_gradual(&self, current: Decimal, suggested: Decimal) -> UpliftAdjustment {
        self.apply_gradual_with_step(current, suggested, self.config.step)
    }

    /// Moves `step` of the distance toward the target, clamped to the uplift
    /// bounds. Changes no larger than `min_change` points are not committed.
    pub fn apply_gradual_with_step(
        &self,
        current: Decimal,
        suggested: Decimal,
        step: Decimal,
    ) -> UpliftAdjustment {
        let (lo, hi) = (self.config.min_uplift, self.config.max_uplift);
        let step = step.clamp(Decimal::ZERO, Decimal::ONE);
        let target = suggested.clamp(lo, hi);
        let adjustment = (target - current) * step;

        if adjustment.abs() <= self.config.min_change {
            return UpliftAdjustment {
                previous: current,
                target,
                adjustment,
                new_uplift: current,
                committed: false,
            };
        }

        let new_uplift = (current + adjustment).clamp(lo, hi).round_dp(3);
        UpliftAdjustment {
            previous: current,
            target,
            adjustment,
            new_uplift,
            committed: new_uplift != current,
        }
    }

    /// Applies one adjustment cycle for the suggestion's artist and persists it
    /// when the change is large enough. The artist's own ceiling caps the target.
    pub async fn steer(
        &self,
        store: &dyn PricingStore,
        suggestion: &DemandSuggestion,
    ) -> EngineResult<(ArtistPricingState, UpliftAdjustment)> {
        let state = store
            .pricing_state(suggestion.pricing_state_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("artist {}", suggestion.pricing_state_id)))?;

        let target = suggestion.suggested_uplift.min(state.max_uplift);
        let adjustment = self.apply_gradual(state.current_uplift, target);

        if !adjustment.committed {
            debug!(
                artist = %state.artist_slug,
                current = %state.current_uplift,
                target = %target,
                "uplift change below threshold, keeping current"
            );
            return Ok((state, adjustment));
        }

        let updated = store
            .set_uplift(state.artist_id, adjustment.new_uplift, Utc::now())
            .await?;
        info!(
            artist = %updated.artist_slug,
            from = %adjustment.previous,
            to = %adjustment.new_uplift,
            demand_score = suggestion.demand_score,
            "uplift steered toward suggestion"
        );
        Ok((updated, adjustment))
    }
}

/// Converts an uplift percentage to `f64` for the demand model.
pub fn uplift_as_f64(uplift: Decimal) -> f64 {
    uplift.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use proptest::prelude::*;

    #[test]
    fn bands_map_velocity_to_uplift() {
        let adjuster = UpliftFeedbackAdjuster::default();
        let cases = [
            (10, 1.0, dec!(175)),
            (7, 2.0, dec!(150)),
            (3, 1.0, dec!(125)),
            (3, 2.0, dec!(100)),
            (1, 1.0, dec!(75)),
            (0, 5.0, dec!(75)),
        ];
        for (sold, minutes, expected) in cases {
            let a = adjuster.assess(sold, minutes).unwrap();
            assert_eq!(a.suggested_uplift, expected, "{sold} sold in {minutes} min");
        }
    }

    #[test]
    fn score_is_capped_at_100() {
        let a = UpliftFeedbackAdjuster::default().assess(1_000, 1.0).unwrap();
        assert_eq!(a.demand_score, 100.0);
        assert_eq!(a.purchases_per_minute, 1_000.0);
    }

    #[test]
    fn zero_elapsed_time_is_invalid() {
        let adjuster = UpliftFeedbackAdjuster::default();
        assert!(matches!(adjuster.assess(5, 0.0), Err(EngineError::InvalidInput(_))));
        assert!(adjuster.suggest(1, 5, f64::NAN, Decimal::ZERO).is_err());
    }

    #[test]
    fn moves_a_fifth_of_the_way() {
        let adj = UpliftFeedbackAdjuster::default().apply_gradual(dec!(25), dec!(175));
        assert!(adj.committed);
        assert_eq!(adj.adjustment, dec!(30));
        assert_eq!(adj.new_uplift, dec!(55));
    }

    #[test]
    fn small_moves_are_not_committed() {
        let adjuster = UpliftFeedbackAdjuster::default();
        let up = adjuster.apply_gradual(dec!(100), dec!(110));
        assert!(!up.committed);
        assert_eq!(up.new_uplift, dec!(100));

        // exactly 5 points is still noise
        let edge = adjuster.apply_gradual(dec!(100), dec!(125));
        assert_eq!(edge.adjustment, dec!(5));
        assert!(!edge.committed);
    }

    #[test]
    fn never_jumps_straight_to_the_suggestion() {
        let adjuster = UpliftFeedbackAdjuster::default();
        let mut uplift = dec!(0);
        let mut cycles = 0;
        loop {
            let adj = adjuster.apply_gradual(uplift, dec!(175));
            if !adj.committed {
                break;
            }
            assert!(adj.new_uplift < dec!(175));
            uplift = adj.new_uplift;
            cycles += 1;
        }
        assert!(cycles >= 5, "converged in {cycles} cycles");
        assert!(dec!(175) - uplift <= dec!(25));
    }

    #[tokio::test]
    async fn steer_persists_committed_changes() {
        let store = MemoryStore::new();
        store
            .upsert_pricing_state(ArtistPricingState {
                artist_id: 1,
                artist_slug: "band".to_string(),
                event_id: 1,
                base_price: dec!(100),
                current_uplift: dec!(25),
                max_uplift: dec!(150),
                last_updated: Utc::now(),
            })
            .await
            .unwrap();

        let adjuster = UpliftFeedbackAdjuster::default();
        let suggestion = adjuster.suggest(1, 100, 1.0, dec!(1000)).unwrap();
        assert_eq!(suggestion.suggested_uplift, dec!(175));

        let (state, adj) = adjuster.steer(&store, &suggestion).await.unwrap();
        // target capped at the artist's ceiling of 150
        assert_eq!(adj.target, dec!(150));
        assert_eq!(state.current_uplift, dec!(50));
        let stored = store.pricing_state(1).await.unwrap().unwrap();
        assert_eq!(stored.current_uplift, dec!(50));
    }

    proptest! {
        #[test]
        fn adjustment_is_bounded(current in 0i64..=2_000, suggested in 0i64..=2_000, step_pct in 1i64..=100) {
            let adjuster = UpliftFeedbackAdjuster::default();
            let current = Decimal::new(current, 1);
            let suggested = Decimal::new(suggested, 1);
            let step = Decimal::new(step_pct, 2);
            let adj = adjuster.apply_gradual_with_step(current, suggested, step);

            prop_assert!((adj.new_uplift - current).abs() <= step * dec!(200));
            prop_assert!(adj.new_uplift >= dec!(0) && adj.new_uplift <= dec!(200));
            if !adj.committed {
                prop_assert_eq!(adj.new_uplift, current);
            }
        }
    }
}
