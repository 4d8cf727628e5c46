pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod personas;
pub mod pricing;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::Config;
use database::Database;
use error::EngineResult;
use personas::PersonaModel;
use pricing::PricingCalculator;
use services::seats::RngSource;
use services::{
    CheckoutService, DemandModel, DemandSimulator, InventoryLedger, SimulationScheduler,
    UpliftFeedbackAdjuster,
};
use store::{LedgerStore, MemoryStore, PgStore, PricingStore};

// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Option<Database>,
    pub ledger: InventoryLedger,
    pub pricing_store: Arc<dyn PricingStore>,
    pub checkout: CheckoutService,
    pub simulator: DemandSimulator,
    pub scheduler: SimulationScheduler,
    pub rngs: Arc<RngSource>,
}

impl AppState {
    /// Connects to Postgres when a database is configured and falls back to
    /// the in-memory store otherwise.
    pub async fn new(config: Config) -> EngineResult<Arc<Self>> {
        match config.database.clone() {
            Some(db_config) => {
                let db = Database::new(&db_config.url, db_config.pool_size).await?;
                info!("Database connected");
                db.run_migrations().await?;
                let store = Arc::new(PgStore::new(db.clone()));
                Self::assemble(config, Some(db), store.clone(), store).await
            }
            None => {
                info!("DATABASE_URL not set, using the in-memory store");
                let store = Arc::new(MemoryStore::new());
                Self::assemble(config, None, store.clone(), store).await
            }
        }
    }

    /// Wires the services over explicit stores.
    pub async fn with_stores(
        config: Config,
        ledger_store: Arc<dyn LedgerStore>,
        pricing_store: Arc<dyn PricingStore>,
    ) -> EngineResult<Arc<Self>> {
        Self::assemble(config, None, ledger_store, pricing_store).await
    }

    async fn assemble(
        config: Config,
        db: Option<Database>,
        ledger_store: Arc<dyn LedgerStore>,
        pricing_store: Arc<dyn PricingStore>,
    ) -> EngineResult<Arc<Self>> {
        let ledger = InventoryLedger::new(ledger_store);
        let calculator = PricingCalculator::from_config(&config.pricing);
        let model = DemandModel::new(config.demand.clone(), PersonaModel::default());
        let adjuster = UpliftFeedbackAdjuster::new(config.feedback.clone());

        let checkout = CheckoutService::new(ledger.clone(), pricing_store.clone(), calculator);
        let simulator = DemandSimulator::new(
            model.clone(),
            calculator,
            ledger.clone(),
            pricing_store.clone(),
            adjuster.clone(),
            config.simulation.max_seat_attempts,
        );
        let scheduler = SimulationScheduler::new(
            ledger.clone(),
            pricing_store.clone(),
            model,
            calculator,
            adjuster,
            config.simulation.clone(),
        )
        .with_inference(config.features.infer_run_state);

        if config.features.seed_demo_data {
            checkout.seed_demo_data().await?;
        }

        info!(backend = ledger.backend(), "pricing engine ready");
        Ok(Arc::new(Self {
            rngs: Arc::new(RngSource::new(config.simulation.seed)),
            config,
            db,
            ledger,
            pricing_store,
            checkout,
            simulator,
            scheduler,
        }))
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Charity pricing engine v0.1" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
