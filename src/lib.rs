//! Tradebook - futures paper-trading order lifecycle and position accounting server

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    AnalyticsEngine, Clock, InventoryLedger, MistakeDetector, PriceCache, RiskMonitor, SqliteStore,
    TradingService,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub clock: Arc<dyn Clock>,
    pub prices: Arc<PriceCache>,
    pub trading: Arc<TradingService>,
    pub inventory: Arc<InventoryLedger>,
    pub analytics: Arc<AnalyticsEngine>,
    pub mistakes: Arc<MistakeDetector>,
    pub risk: Arc<RiskMonitor>,
}

impl AppState {
    /// Wire every service over one store.
    pub fn new(config: Config, store: Arc<SqliteStore>, clock: Arc<dyn Clock>) -> Self {
        let prices = Arc::new(PriceCache::new(Duration::from_secs(
            config.scheduler.price_stale_secs,
        )));
        let trading = Arc::new(TradingService::new(
            store.clone(),
            clock.clone(),
            config.costs.clone(),
        ));
        let inventory = Arc::new(InventoryLedger::new(store.clone(), clock.clone()));
        let analytics = Arc::new(AnalyticsEngine::new(
            store.clone(),
            config.scheduler.market_offset(),
        ));
        let mistakes = Arc::new(MistakeDetector::new(
            store.clone(),
            clock.clone(),
            config.review.rapid_reentry_minutes,
        ));
        let risk = Arc::new(RiskMonitor::new(
            store,
            prices.clone(),
            clock.clone(),
            config.review.default_max_high_risk_trades,
        ));

        Self {
            clock,
            prices,
            trading,
            inventory,
            analytics,
            mistakes,
            risk,
        }
    }
}

/// Build the HTTP application.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Re-export commonly used types
pub use types::*;
