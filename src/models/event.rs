use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct EventInventory {
    pub event_id: i64,
    pub total_tickets: i32,
    pub sold_tickets: i32,
}

impl EventInventory {
    pub fn new(event_id: i64, total_tickets: i32) -> Self {
        Self { event_id, total_tickets, sold_tickets: 0 }
    }

    pub fn available(&self) -> i32 {
        (self.total_tickets - self.sold_tickets).max(0)
    }

    pub fn is_sold_out(&self) -> bool {
        self.sold_tickets >= self.total_tickets
    }
}
