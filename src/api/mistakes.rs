//! Mistakes API
//!
//! - GET /api/mistakes?email= - Persisted mistake log
//! - POST /api/mistakes - Detect and merge, or merge the supplied entries

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
use crate::types::{MistakeEntry, SyncMistakesRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_mistakes).post(sync_mistakes))
}

#[derive(Debug, Serialize)]
pub struct MistakesResponse {
    pub mistakes: Vec<MistakeEntry>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub added: usize,
    pub total: usize,
    pub mistakes: Vec<MistakeEntry>,
}

/// GET /api/mistakes
async fn list_mistakes(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<MistakesResponse>, AppError> {
    let Query(query) = query?;
    let mistakes = state.mistakes.log(&query.email)?;
    Ok(Json(MistakesResponse { mistakes }))
}

/// POST /api/mistakes
async fn sync_mistakes(
    State(state): State<AppState>,
    payload: Result<Json<SyncMistakesRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, AppError> {
    let Json(request) = payload?;
    let synced = state.mistakes.sync(&request.email, request.mistakes)?;

    Ok(Json(SyncResponse {
        success: true,
        added: synced.added,
        total: synced.total,
        mistakes: synced.mistakes,
    }))
}
