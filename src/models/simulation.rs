use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a reported run state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStateSource {
    /// This process owns a live timer.
    Explicit,
    /// Derived from recent purchase timestamps in the ledger.
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRunState {
    pub is_running: bool,
    pub tickets_per_minute: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub purchases: u64,
    pub source: RunStateSource,
}

impl SimulationRunState {
    pub fn stopped() -> Self {
        Self {
            is_running: false,
            tickets_per_minute: None,
            started_at: None,
            last_activity_at: None,
            ticks: 0,
            purchases: 0,
            source: RunStateSource::Explicit,
        }
    }

    pub fn running(tickets_per_minute: f64, now: DateTime<Utc>) -> Self {
        Self {
            is_running: true,
            tickets_per_minute: Some(tickets_per_minute),
            started_at: Some(now),
            last_activity_at: Some(now),
            ticks: 0,
            purchases: 0,
            source: RunStateSource::Explicit,
        }
    }
}
