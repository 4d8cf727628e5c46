use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only feedback entry produced once per simulation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSuggestion {
    pub id: Uuid,
    pub pricing_state_id: i64,
    pub suggested_uplift: Decimal,
    pub reason: String,
    pub tickets_sold: u32,
    pub total_revenue: Decimal,
    pub demand_score: f64,
    pub created_at: DateTime<Utc>,
}
