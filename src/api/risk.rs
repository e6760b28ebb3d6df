//! Risk API
//!
//! - GET /api/risk?email= - SAFE / LOCKED status over pending orders
//! - GET /api/risk/settings?email= - Current high-risk limit
//! - PUT /api/risk/settings - Change the high-risk limit

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::get,
    Json, Router,
};

use crate::api::EmailQuery;
use crate::error::AppError;
use crate::types::{RiskReport, RiskSettings, UpdateRiskSettingsRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_status))
        .route("/settings", get(get_settings).put(update_settings))
}

/// GET /api/risk
async fn get_status(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<RiskReport>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.risk.status(&query.email)?))
}

/// GET /api/risk/settings
async fn get_settings(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<RiskSettings>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.risk.settings(&query.email)?))
}

/// PUT /api/risk/settings
async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRiskSettingsRequest>, JsonRejection>,
) -> Result<Json<RiskSettings>, AppError> {
    let Json(request) = payload?;
    let settings = state
        .risk
        .update_settings(&request.email, request.max_high_risk_trades)?;
    Ok(Json(settings))
}
