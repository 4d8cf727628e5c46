use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/simulation/start", post(start))
        .route("/simulation/stop", post(stop))
        .route("/simulation/state", get(get_state))
        .route("/simulation/reset", post(reset_all))
}

#[derive(Debug, Deserialize, Validate)]
struct StartRequest {
    #[validate(range(exclusive_min = 0.0, max = 60000.0))]
    tickets_per_minute: f64,
}

// POST /api/simulation/start
async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate()?;
    Ok(Json(state.scheduler.start(req.tickets_per_minute).await?))
}

// POST /api/simulation/stop
async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.stop().await)
}

// GET /api/simulation/state
async fn get_state(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.scheduler.get_state().await?))
}

// POST /api/simulation/reset
async fn reset_all(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.ledger.reset_all().await?))
}
