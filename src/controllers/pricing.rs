use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/price", get(price))
        .route("/artists/{artist}/quote", get(quote))
        .route("/artists/{artist}/uplift", put(set_uplift))
        .route("/artists/{artist}/suggestions", get(list_suggestions))
        .route("/artists/{artist}/simulate", post(simulate_batch))
}

// GET /api/price?face_value=100&uplift=25
#[derive(Debug, Deserialize)]
struct PriceQuery {
    face_value: Decimal,
    #[serde(default)]
    uplift: Decimal,
}

async fn price(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PriceQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let breakdown = state.checkout.price(q.face_value, q.uplift)?;
    Ok(Json(breakdown))
}

// GET /api/artists/{id}/quote
async fn quote(
    State(state): State<Arc<AppState>>,
    Path(artist_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.checkout.quote(artist_id).await?))
}

// PUT /api/artists/{id}/uplift
#[derive(Debug, Deserialize)]
struct SetUpliftRequest {
    uplift: Decimal,
}

async fn set_uplift(
    State(state): State<Arc<AppState>>,
    Path(artist_id): Path<i64>,
    Json(req): Json<SetUpliftRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let updated = state.checkout.set_uplift(artist_id, req.uplift).await?;
    Ok(Json(updated))
}

// GET /api/artists/{id}/suggestions
async fn list_suggestions(
    State(state): State<Arc<AppState>>,
    Path(artist_id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    state.checkout.artist(artist_id).await?;
    let suggestions = state.pricing_store.suggestions_for(artist_id).await?;
    Ok(Json(suggestions))
}

// POST /api/artists/{id}/simulate
#[derive(Debug, Deserialize, Validate)]
struct SimulateRequest {
    /// Simulated minutes, up to one week.
    #[validate(range(exclusive_min = 0.0, max = 10080.0))]
    duration_minutes: f64,
}

async fn simulate_batch(
    State(state): State<Arc<AppState>>,
    Path(artist_id): Path<i64>,
    Json(req): Json<SimulateRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate()?;
    let mut rng = state.rngs.next_rng();
    let outcome = state
        .simulator
        .simulate_batch(artist_id, req.duration_minutes, &mut rng)
        .await?;
    Ok(Json(outcome))
}
