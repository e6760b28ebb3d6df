//! Analytics API
//!
//! - GET /api/analytics?email=&source=fifo|closed - Performance report
//! - GET /api/analytics/trades?email= - Reconstructed round trips and open lots

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::EmailQuery;
use crate::error::AppError;
use crate::types::{AnalyticsReport, Reconstruction, TradeSource};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_report))
        .route("/trades", get(get_trades))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub email: String,
    #[serde(default)]
    pub source: TradeSource,
}

/// GET /api/analytics
async fn get_report(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let Query(query) = query?;
    let report = state.analytics.report(&query.email, query.source)?;
    Ok(Json(report))
}

/// GET /api/analytics/trades
async fn get_trades(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<Reconstruction>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.analytics.reconstruction(&query.email)?))
}
