pub mod pricing;
pub mod seats;
pub mod simulation;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(pricing::routes())
        .merge(seats::routes())
        .merge(simulation::routes())
}
