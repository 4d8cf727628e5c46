use charity_pricing::models::{EventInventory, PurchaseSource, SeatPurchaseRecord, SeatRequest};
use charity_pricing::services::seats::{RngSource, SeatGenerator};
use charity_pricing::services::InventoryLedger;
use charity_pricing::store::MemoryStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// A fixed purchase sequence across two events, with a few repeated seats
/// that the ledger must reject the same way on every replay.
fn sequence() -> Vec<(i64, SeatRequest)> {
    let mut rng = RngSource::new(Some(2024)).next_rng();
    let mut seats = Vec::new();
    for n in 0..40 {
        let event_id = if n % 3 == 0 { 2 } else { 1 };
        seats.push((event_id, SeatGenerator::for_event(event_id).candidate(&mut rng)));
    }
    let repeated = seats[0].clone();
    seats.push(repeated);
    seats
}

async fn replay(ledger: &InventoryLedger) -> (i32, i32, usize) {
    let mut accepted = 0;
    for (event_id, seat) in sequence() {
        let artist = if event_id == 1 { "first" } else { "second" };
        let record =
            SeatPurchaseRecord::from_request(seat, artist, event_id, dec!(10), PurchaseSource::Simulated);
        if ledger.reserve_and_record(record).await.is_ok() {
            accepted += 1;
        }
    }
    let first = ledger.event_inventory(1).await.unwrap().unwrap().sold_tickets;
    let second = ledger.event_inventory(2).await.unwrap().unwrap().sold_tickets;
    (first, second, accepted)
}

#[tokio::test]
async fn reset_then_replay_reproduces_counts() {
    let ledger = InventoryLedger::new(Arc::new(MemoryStore::new()));
    ledger
        .register_event(EventInventory { event_id: 1, total_tickets: 500, sold_tickets: 12 })
        .await
        .unwrap();
    ledger.register_event(EventInventory::new(2, 8)).await.unwrap();

    let first_run = replay(&ledger).await;
    assert!(first_run.2 < 41, "the repeated seat must be rejected");
    assert_eq!(first_run.1, 8, "the small event sells out");

    let summary = ledger.reset_all().await.unwrap();
    assert_eq!(summary.records_deleted as usize, first_run.2);
    assert_eq!(ledger.event_inventory(1).await.unwrap().unwrap().sold_tickets, 12);
    assert_eq!(ledger.event_inventory(2).await.unwrap().unwrap().sold_tickets, 0);
    assert_eq!(ledger.total_purchases().await.unwrap(), 0);

    let second_run = replay(&ledger).await;
    assert_eq!(first_run, second_run);
}

#[tokio::test]
async fn reset_on_an_empty_ledger_changes_nothing() {
    let ledger = InventoryLedger::new(Arc::new(MemoryStore::new()));
    ledger
        .register_event(EventInventory { event_id: 1, total_tickets: 5, sold_tickets: 3 })
        .await
        .unwrap();
    let summary = ledger.reset_all().await.unwrap();
    assert_eq!(summary.records_deleted, 0);
    assert_eq!(summary.events_restored, 0);
    assert_eq!(ledger.event_inventory(1).await.unwrap().unwrap().sold_tickets, 3);
}
