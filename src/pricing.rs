//! Price breakdowns for charity-uplift tickets.
//!
//! A ticket's total is its face value, plus the artist's charity uplift,
//! plus a platform fee charged on that subtotal. The same calculator is used
//! to quote a price and to settle a purchase, so the two can never diverge.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::config::PricingConfig;
use crate::error::{EngineError, EngineResult};

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub face_value: Decimal,
    pub charity_amount: Decimal,
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct PricingCalculator {
    fee_rate: Decimal,
    fixed_fee: Decimal,
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

impl PricingCalculator {
    pub fn new(fee_rate: Decimal, fixed_fee: Decimal) -> EngineResult<Self> {
        if fee_rate < Decimal::ZERO || fixed_fee < Decimal::ZERO {
            return Err(EngineError::invalid("platform fees must be non-negative"));
        }
        Ok(Self { fee_rate, fixed_fee })
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            fee_rate: config.fee_rate.max(Decimal::ZERO),
            fixed_fee: config.fixed_fee.max(Decimal::ZERO),
        }
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn fixed_fee(&self) -> Decimal {
        self.fixed_fee
    }

    /// Computes the full breakdown for a face value and an uplift percentage.
    pub fn price(&self, face_value: Decimal, uplift_pct: Decimal) -> EngineResult<PriceBreakdown> {
        if face_value < Decimal::ZERO {
            return Err(EngineError::invalid(format!("face value {face_value} is negative")));
        }
        if uplift_pct < Decimal::ZERO {
            return Err(EngineError::invalid(format!("uplift {uplift_pct}% is negative")));
        }

        let charity_amount = face_value * uplift_pct / HUNDRED;
        let subtotal = face_value + charity_amount;
        let platform_fee = subtotal * self.fee_rate + self.fixed_fee;

        Ok(PriceBreakdown {
            face_value,
            charity_amount,
            subtotal,
            platform_fee,
            total_price: subtotal + platform_fee,
        })
    }
}
