pub mod analytics;
pub mod health;
pub mod inventory;
pub mod mistakes;
pub mod risk;
pub mod trading;

use crate::AppState;
use axum::Router;
use serde::Deserialize;

/// `?email=` query shared by the account-scoped read endpoints.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/trading", trading::router())
        .nest("/api/inventory", inventory::router())
        .nest("/api/analytics", analytics::router())
        .nest("/api/mistakes", mistakes::router())
        .nest("/api/risk", risk::router())
}
