//! Trading API
//!
//! Endpoints for the order lifecycle:
//!
//! Orders:
//! - GET /api/trading/orders?email= - Buy list, sell list and combined view
//! - POST /api/trading/orders - Place an order
//! - POST /api/trading/orders/execute - Execute a pending order
//! - POST /api/trading/orders/cancel - Cancel a pending order
//! - DELETE /api/trading/orders/:id?email= - Move an order to trash
//! - POST /api/trading/orders/:id/restore?email= - Restore an order from trash
//! - GET /api/trading/trash?email= - List trashed orders
//!
//! Positions:
//! - GET /api/trading/positions?email= - Filled orders not yet closed
//! - POST /api/trading/positions/close - Close a position
//!
//! Limit orders and prices:
//! - POST /api/trading/limit-orders/check - Sweep pending limit orders at a price
//! - POST /api/trading/prices - Ingest a price tick

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::EmailQuery;
use crate::error::AppError;
use crate::services::{ErrorKind, ExecutionOutcome, TradingError};
use crate::types::{
    CheckLimitOrdersRequest, ClosePositionRequest, Order, OrderActionRequest, PlaceOrderRequest,
    PriceTick, Quote, TradeStatus,
};
use crate::AppState;

/// Create trading router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Order routes
        .route("/orders", get(list_orders))
        .route("/orders", post(place_order))
        .route("/orders/execute", post(execute_order))
        .route("/orders/cancel", post(cancel_order))
        .route("/orders/:id", delete(trash_order))
        .route("/orders/:id/restore", post(restore_order))
        .route("/trash", get(list_trash))
        // Position routes
        .route("/positions", get(list_positions))
        .route("/positions/close", post(close_position))
        // Limit orders and prices
        .route("/limit-orders/check", post(check_limit_orders))
        .route("/prices", post(ingest_price))
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Convert TradingError to HTTP response.
impl IntoResponse for TradingError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.kind() {
            ErrorKind::Validation | ErrorKind::State => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match &self {
            TradingError::MissingField(_) => "MISSING_FIELD",
            TradingError::InvalidField { .. } => "INVALID_FIELD",
            TradingError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TradingError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            TradingError::OrderNotCancelable(_) => "ORDER_NOT_CANCELABLE",
            TradingError::PositionNotFilled(_) => "POSITION_NOT_FILLED",
            TradingError::PositionAlreadyClosed(_) => "POSITION_ALREADY_CLOSED",
            TradingError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            TradingError::PendingOrderNotTrashable(_) => "ORDER_PENDING",
            TradingError::NotInTrash(_) => "NOT_IN_TRASH",
            TradingError::Database(_) => "INTERNAL_ERROR",
        };

        let error = match &self {
            TradingError::Database(e) => {
                tracing::error!("Storage failure: {}", e);
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersResponse {
    pub buy_orders: Vec<Order>,
    pub sell_orders: Vec<Order>,
    pub total_orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub message: String,
    pub order: Order,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub message: String,
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TrashResponse {
    pub trash: Vec<Order>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub total_positions: Vec<Order>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionResponse {
    pub message: String,
    pub pnl: f64,
    pub trade_status: TradeStatus,
    pub exit_price: f64,
    pub brokerage: f64,
    pub charges: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLimitOrdersResponse {
    pub message: String,
    pub executed_orders: Vec<Order>,
    pub total_executed: usize,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub message: String,
    pub quote: Quote,
}

// =============================================================================
// Order Handlers
// =============================================================================

/// GET /api/trading/orders
async fn list_orders(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<OrdersResponse>, AppError> {
    let Query(query) = query?;
    let orders = state.trading.orders(&query.email)?;
    let total_orders = orders.total_orders().cloned().collect();

    Ok(Json(OrdersResponse {
        buy_orders: orders.buy_orders,
        sell_orders: orders.sell_orders,
        total_orders,
    }))
}

/// POST /api/trading/orders
async fn place_order(
    State(state): State<AppState>,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let Json(request) = payload?;
    let order = state.trading.place_order(request)?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            message: "Order placed successfully".to_string(),
            order,
        }),
    ))
}

/// POST /api/trading/orders/execute
///
/// Executing an order that is no longer pending succeeds without applying it again.
async fn execute_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderActionRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Json(request) = payload?;
    let outcome = state.trading.execute_order(&request.email, &request.order_id)?;

    let message = match &outcome {
        ExecutionOutcome::Executed(_) => "Order executed successfully",
        ExecutionOutcome::AlreadyProcessed(_) => "Order already processed",
    };
    Ok(Json(OrderResponse {
        message: message.to_string(),
        order: outcome.order().clone(),
    }))
}

/// POST /api/trading/orders/cancel
async fn cancel_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderActionRequest>, JsonRejection>,
) -> Result<Json<CancelResponse>, AppError> {
    let Json(request) = payload?;
    let order = state.trading.cancel_order(&request.email, &request.order_id)?;

    Ok(Json(CancelResponse {
        message: "Order cancelled successfully".to_string(),
        order_id: order.id().to_string(),
        status: order.status().to_string(),
    }))
}

/// DELETE /api/trading/orders/:id
async fn trash_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Query(query) = query?;
    let order = state.trading.trash_order(&query.email, &id)?;

    Ok(Json(OrderResponse {
        message: "Order moved to trash".to_string(),
        order,
    }))
}

/// POST /api/trading/orders/:id/restore
async fn restore_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Query(query) = query?;
    let order = state.trading.restore_order(&query.email, &id)?;

    Ok(Json(OrderResponse {
        message: "Order restored".to_string(),
        order,
    }))
}

/// GET /api/trading/trash
async fn list_trash(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<TrashResponse>, AppError> {
    let Query(query) = query?;
    let trash = state.trading.trash(&query.email)?;
    Ok(Json(TrashResponse { trash }))
}

// =============================================================================
// Position Handlers
// =============================================================================

/// GET /api/trading/positions
async fn list_positions(
    State(state): State<AppState>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<PositionsResponse>, AppError> {
    let Query(query) = query?;
    let total_positions = state.trading.positions(&query.email)?;
    Ok(Json(PositionsResponse { total_positions }))
}

/// POST /api/trading/positions/close
async fn close_position(
    State(state): State<AppState>,
    payload: Result<Json<ClosePositionRequest>, JsonRejection>,
) -> Result<Json<ClosePositionResponse>, AppError> {
    let Json(request) = payload?;
    let closed = state.trading.close_position(&request)?;

    Ok(Json(ClosePositionResponse {
        message: "Position closed successfully".to_string(),
        pnl: closed.pnl,
        trade_status: closed.trade_status,
        exit_price: closed.exit_price,
        brokerage: closed.brokerage,
        charges: closed.charges,
    }))
}

// =============================================================================
// Limit Order & Price Handlers
// =============================================================================

/// POST /api/trading/limit-orders/check
///
/// Refreshes the cached price, then sweeps the instrument once.
async fn check_limit_orders(
    State(state): State<AppState>,
    payload: Result<Json<CheckLimitOrdersRequest>, JsonRejection>,
) -> Result<Json<CheckLimitOrdersResponse>, AppError> {
    let Json(request) = payload?;
    if request.symbol.trim().is_empty() {
        return Err(TradingError::MissingField("symbol").into());
    }
    if request.market.trim().is_empty() {
        return Err(TradingError::MissingField("market").into());
    }
    if !(request.current_price.is_finite() && request.current_price > 0.0) {
        return Err(TradingError::InvalidField {
            field: "currentPrice",
            reason: "must be a positive number".to_string(),
        }
        .into());
    }

    state.prices.update(
        &PriceTick {
            symbol: request.symbol.clone(),
            market: request.market.clone(),
            price: request.current_price,
            high: None,
            low: None,
            open: None,
            close: None,
        },
        state.clock.now_ms(),
    );
    let executed_orders =
        state
            .trading
            .check_limit_orders(&request.market, &request.symbol, request.current_price)?;

    Ok(Json(CheckLimitOrdersResponse {
        message: format!("Checked limit orders for {}", request.symbol),
        total_executed: executed_orders.len(),
        executed_orders,
    }))
}

/// POST /api/trading/prices
async fn ingest_price(
    State(state): State<AppState>,
    payload: Result<Json<PriceTick>, JsonRejection>,
) -> Result<Json<PriceResponse>, AppError> {
    let Json(tick) = payload?;
    if tick.symbol.trim().is_empty() || tick.market.trim().is_empty() {
        return Err(AppError::BadRequest(
            "symbol and market are required".to_string(),
        ));
    }
    if !(tick.price.is_finite() && tick.price > 0.0) {
        return Err(AppError::BadRequest("price must be a positive number".to_string()));
    }

    let quote = state.prices.update(&tick, state.clock.now_ms());
    Ok(Json(PriceResponse {
        message: "Price updated".to_string(),
        quote,
    }))
}
