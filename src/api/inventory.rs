//! Inventory API
//!
//! - GET /api/inventory?email= - Holdings for an account
//! - POST /api/inventory - Apply a buy or sell to the ledger

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::EmailQuery;
use crate::error::AppError;
use crate::types::{InventoryItem, UpdateInventoryRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_inventory).post(update_inventory))
}

#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub inventory: Vec<InventoryItem>,
}

#[derive(Debug, Serialize)]
pub struct UpdateInventoryResponse {
    pub success: bool,
    pub message: String,
    pub inventory: Vec<InventoryItem>,
}

/// GET /api/inventory
async fn list_inventory(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<InventoryResponse>, AppError> {
    let Query(query) = query?;
    let inventory = state.inventory.list(&query.email)?;
    Ok(Json(InventoryResponse { inventory }))
}

/// POST /api/inventory
async fn update_inventory(
    State(state): State<AppState>,
    payload: Result<Json<UpdateInventoryRequest>, JsonRejection>,
) -> Result<Json<UpdateInventoryResponse>, AppError> {
    let Json(request) = payload?;
    let inventory = state.inventory.update(&request)?;

    Ok(Json(UpdateInventoryResponse {
        success: true,
        message: format!("Inventory updated for {}", request.symbol),
        inventory,
    }))
}
