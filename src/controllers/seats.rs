use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;
use crate::models::SeatRequest;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/artists/{artist}/seats", get(purchased_seats))
        .route("/artists/{artist}/seats/{seat_id}", get(is_purchased))
        .route("/artists/{artist}/purchases", post(record_purchase))
        .route("/purchases/total", get(total_purchases))
}

// GET /api/artists/{slug}/seats
async fn purchased_seats(
    State(state): State<Arc<AppState>>,
    Path(artist_slug): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.ledger.query_by_artist(&artist_slug).await?))
}

#[derive(Debug, Serialize)]
struct SeatStatus {
    seat_id: String,
    artist_slug: String,
    purchased: bool,
}

// GET /api/artists/{slug}/seats/{seat_id}
async fn is_purchased(
    State(state): State<Arc<AppState>>,
    Path((artist_slug, seat_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, EngineError> {
    let purchased = state.ledger.is_purchased(&seat_id, &artist_slug).await?;
    Ok(Json(SeatStatus {
        seat_id,
        artist_slug,
        purchased,
    }))
}

// POST /api/artists/{slug}/purchases
#[derive(Debug, Serialize, Deserialize, Validate)]
struct SeatInput {
    #[validate(length(min = 1, max = 64))]
    seat_id: String,
    #[validate(length(min = 1, max = 32))]
    venue_layout: String,
    #[validate(length(min = 1, max = 32))]
    section: String,
    #[validate(range(min = 1))]
    row: i32,
    #[validate(range(min = 1))]
    number: i32,
    #[validate(length(min = 1, max = 32))]
    ticket_type_id: String,
}

impl From<SeatInput> for SeatRequest {
    fn from(s: SeatInput) -> Self {
        SeatRequest {
            seat_id: s.seat_id,
            venue_layout: s.venue_layout,
            section: s.section,
            row: s.row,
            number: s.number,
            ticket_type_id: s.ticket_type_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct PurchaseRequest {
    #[validate(length(min = 1, max = 20), nested)]
    seats: Vec<SeatInput>,
}

async fn record_purchase(
    State(state): State<Arc<AppState>>,
    Path(artist_slug): Path<String>,
    Json(req): Json<PurchaseRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate()?;
    let seats = req.seats.into_iter().map(SeatRequest::from).collect();
    let receipt = state
        .checkout
        .record_manual_purchase(&artist_slug, seats)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// GET /api/purchases/total
async fn total_purchases(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    let total = state.ledger.total_purchases().await?;
    Ok(Json(json!({ "total": total })))
}
