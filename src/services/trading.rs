//! Trading Service
//!
//! Handles the order lifecycle for paper trading:
//! - Placement (market orders fill immediately, limit orders wait)
//! - Execution of pending orders, manual or from the limit sweep
//! - Cancellation, trash and restore
//! - Closing the position opened by a filled order
//!
//! Every order write that touches inventory runs in one SQLite transaction, and
//! fills are conditional on the stored status still being `pending`, so an order
//! is applied to the ledger at most once whoever fills it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::CostConfig;
use crate::services::inventory::fill_for_order;
use crate::services::{Clock, InventoryLedger, SqliteStore, StoreError, StoreTx};
use crate::types::{
    charges_for, classify_exit, AccountOrders, ClosePositionRequest, ClosedPosition, Order,
    OrderCore, OrderStatus, OrderType, PlaceOrderRequest, Side, TradeStatus,
};

/// Trading service errors.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {0} is not pending and cannot be cancelled")]
    OrderNotCancelable(String),

    #[error("Order {0} has not been filled")]
    PositionNotFilled(String),

    #[error("Position for order {0} is already closed")]
    PositionAlreadyClosed(String),

    #[error("Insufficient inventory for {symbol}: {detail}")]
    InsufficientInventory { symbol: String, detail: String },

    #[error("Order {0} is pending and cannot be moved to trash")]
    PendingOrderNotTrashable(String),

    #[error("Order {0} is not in trash")]
    NotInTrash(String),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),
}

/// Broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Internal,
}

impl TradingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradingError::MissingField(_) | TradingError::InvalidField { .. } => {
                ErrorKind::Validation
            }
            TradingError::AccountNotFound(_)
            | TradingError::OrderNotFound(_)
            | TradingError::NotInTrash(_) => ErrorKind::NotFound,
            TradingError::OrderNotCancelable(_)
            | TradingError::PositionNotFilled(_)
            | TradingError::PositionAlreadyClosed(_)
            | TradingError::InsufficientInventory { .. }
            | TradingError::PendingOrderNotTrashable(_) => ErrorKind::State,
            TradingError::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Result of an execute request.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The order was pending and is now filled.
    Executed(Order),
    /// The order had already left `pending`; nothing was applied.
    AlreadyProcessed(Order),
}

impl ExecutionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ExecutionOutcome::Executed(order) | ExecutionOutcome::AlreadyProcessed(order) => order,
        }
    }
}

/// Paper trading service.
pub struct TradingService {
    store: Arc<SqliteStore>,
    clock: Arc<dyn Clock>,
    costs: CostConfig,
}

impl TradingService {
    pub fn new(store: Arc<SqliteStore>, clock: Arc<dyn Clock>, costs: CostConfig) -> Self {
        Self {
            store,
            clock,
            costs,
        }
    }

    // ========== Placement ==========

    /// Validate and record a new order. Market orders fill immediately.
    pub fn place_order(&self, request: PlaceOrderRequest) -> Result<Order, TradingError> {
        let (side, order_type) = validate_placement(&request)?;
        let now = self.clock.now_ms();

        let notional = request.price * f64::from(request.quantity);
        let mut order = Order::new(
            side,
            OrderCore {
                id: uuid::Uuid::new_v4().to_string(),
                email: request.email.clone(),
                symbol: request.symbol.clone(),
                market: request.market.clone(),
                exchange: request.exchange.clone(),
                token: request.token.clone(),
                lot: request.lot,
                price: request.price,
                quantity: request.quantity,
                order_type,
                status: OrderStatus::Pending,
                timestamp: now,
                entry_price: request.price,
                exit_price: None,
                stop_loss: request.stop_loss,
                target: request.target,
                brokerage: self.costs.brokerage_per_order,
                charges: charges_for(notional, self.costs.charge_rate),
                trade_status: TradeStatus::Pending,
                executed_at: None,
                executed_price: None,
                closed_at: None,
                snapshot: request.snapshot(),
            },
        );
        if order_type == OrderType::Market {
            order.fill(now, None);
        }

        self.store.transaction(|tx| {
            tx.ensure_account(&request.email, now)?;
            if side == Side::Sell {
                InventoryLedger::ensure_coverage(
                    tx,
                    &request.email,
                    &request.symbol,
                    order.inventory_exchange(),
                    request.lot,
                )?;
            }
            tx.insert_order(&order)?;
            if order.is_filled() {
                InventoryLedger::apply_fill(tx, &request.email, &fill_for_order(&order), now)?;
            }
            Ok::<_, TradingError>(())
        })?;

        info!(
            "Placed {} {} order {} for {} {} x{} @ {}",
            order_type,
            side,
            order.id(),
            request.email,
            request.symbol,
            request.quantity,
            request.price
        );
        Ok(order)
    }

    // ========== Queries ==========

    /// Active orders of an account.
    pub fn orders(&self, email: &str) -> Result<AccountOrders, TradingError> {
        self.store.read(|tx| {
            require_account(tx, email)?;
            Ok(tx.account_orders(email)?)
        })
    }

    /// Filled orders whose position is still open.
    pub fn positions(&self, email: &str) -> Result<Vec<Order>, TradingError> {
        let orders = self.orders(email)?;
        Ok(orders.total_positions().cloned().collect())
    }

    pub fn trash(&self, email: &str) -> Result<Vec<Order>, TradingError> {
        self.store.read(|tx| {
            require_account(tx, email)?;
            Ok(tx.trashed_orders(email)?)
        })
    }

    // ========== Execution ==========

    /// Fill a pending order at its own price. A non-pending order is left alone.
    pub fn execute_order(&self, email: &str, order_id: &str) -> Result<ExecutionOutcome, TradingError> {
        let now = self.clock.now_ms();
        let outcome = self.store.transaction(|tx| {
            require_account(tx, email)?;
            let order = active_order(tx, email, order_id)?;
            if !order.is_pending() {
                return Ok(ExecutionOutcome::AlreadyProcessed(order));
            }
            match fill_pending(tx, order.clone(), now, None)? {
                Some(filled) => Ok::<_, TradingError>(ExecutionOutcome::Executed(filled)),
                None => Ok(ExecutionOutcome::AlreadyProcessed(order)),
            }
        })?;

        match &outcome {
            ExecutionOutcome::Executed(order) => info!("Executed order {} for {}", order.id(), email),
            ExecutionOutcome::AlreadyProcessed(order) => {
                debug!("Order {} already {}, nothing to execute", order.id(), order.status())
            }
        }
        Ok(outcome)
    }

    /// Instruments with at least one pending limit order.
    pub fn pending_limit_pairs(&self) -> Result<Vec<(String, String)>, TradingError> {
        Ok(self.store.read(|tx| tx.pending_limit_pairs())?)
    }

    /// Fill every pending limit order on `(market, symbol)` that `current_price`
    /// triggers, across all accounts. Orders that fail to fill stay pending.
    pub fn check_limit_orders(
        &self,
        market: &str,
        symbol: &str,
        current_price: f64,
    ) -> Result<Vec<Order>, TradingError> {
        if !(current_price.is_finite() && current_price > 0.0) {
            return Err(TradingError::InvalidField {
                field: "currentPrice",
                reason: "must be a positive number".to_string(),
            });
        }

        let now = self.clock.now_ms();
        let candidates = self
            .store
            .read(|tx| tx.pending_limit_orders(market, symbol))?;

        let mut executed = Vec::new();
        for order in candidates
            .into_iter()
            .filter(|order| order.limit_triggered(current_price))
        {
            let order_id = order.id().to_string();
            match self
                .store
                .transaction(|tx| fill_pending(tx, order, now, Some(current_price)))
            {
                Ok(Some(filled)) => {
                    info!(
                        "Limit {} order {} filled at {} (market {})",
                        filled.side(),
                        order_id,
                        filled.core().price,
                        current_price
                    );
                    executed.push(filled);
                }
                Ok(None) => debug!("Limit order {} was filled elsewhere", order_id),
                Err(TradingError::Database(e)) => {
                    error!("Failed to fill limit order {}: {}", order_id, e)
                }
                Err(e) => warn!("Skipping limit order {}: {}", order_id, e),
            }
        }
        Ok(executed)
    }

    // ========== Cancellation & Trash ==========

    /// Cancel a pending order.
    pub fn cancel_order(&self, email: &str, order_id: &str) -> Result<Order, TradingError> {
        let order = self.store.transaction(|tx| {
            require_account(tx, email)?;
            let mut order = active_order(tx, email, order_id)?;
            if !order.is_pending() {
                return Err(TradingError::OrderNotCancelable(order_id.to_string()));
            }
            order.cancel();
            if !tx.update_order_if_status(&order, OrderStatus::Pending)? {
                return Err(TradingError::OrderNotCancelable(order_id.to_string()));
            }
            Ok(order)
        })?;

        info!("Cancelled order {} for {}", order_id, email);
        Ok(order)
    }

    /// Move a non-pending order into the trash.
    pub fn trash_order(&self, email: &str, order_id: &str) -> Result<Order, TradingError> {
        self.store.transaction(|tx| {
            require_account(tx, email)?;
            let order = active_order(tx, email, order_id)?;
            if order.is_pending() {
                return Err(TradingError::PendingOrderNotTrashable(order_id.to_string()));
            }
            if !tx.set_trashed(email, order_id, true)? {
                return Err(TradingError::OrderNotFound(order_id.to_string()));
            }
            info!("Moved order {} to trash", order_id);
            Ok(order)
        })
    }

    /// Bring an order back from the trash into its original list.
    pub fn restore_order(&self, email: &str, order_id: &str) -> Result<Order, TradingError> {
        self.store.transaction(|tx| {
            require_account(tx, email)?;
            let stored = tx
                .get_order(email, order_id)?
                .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))?;
            if !stored.trashed || !tx.set_trashed(email, order_id, false)? {
                return Err(TradingError::NotInTrash(order_id.to_string()));
            }
            info!(
                "Restored order {} to {}",
                order_id,
                stored.order.side().list_name()
            );
            Ok(stored.order)
        })
    }

    /// Remove every pending limit order, across all accounts.
    pub fn purge_pending_limit_orders(&self) -> Result<usize, TradingError> {
        let removed = self.store.read(|tx| tx.delete_pending_limit_orders())?;
        info!("Purged {} pending limit orders", removed);
        Ok(removed)
    }

    // ========== Positions ==========

    /// Record the exit of a filled order and classify the outcome.
    pub fn close_position(&self, request: &ClosePositionRequest) -> Result<ClosedPosition, TradingError> {
        if !(request.exit_price.is_finite() && request.exit_price > 0.0) {
            return Err(TradingError::InvalidField {
                field: "exitPrice",
                reason: "must be a positive number".to_string(),
            });
        }

        let now = self.clock.now_ms();
        let rate = self.costs.charge_rate;
        let closed = self.store.transaction(|tx| {
            require_account(tx, &request.email)?;
            let mut order = active_order(tx, &request.email, &request.order_id)?;
            if !order.is_filled() {
                return Err(TradingError::PositionNotFilled(request.order_id.clone()));
            }
            if order.is_closed() {
                return Err(TradingError::PositionAlreadyClosed(request.order_id.clone()));
            }

            let side = order.side();
            let core = order.core_mut();
            let trade_status = classify_exit(
                side,
                request.exit_price,
                core.stop_loss,
                core.target,
                request.exit_type.as_deref(),
            );
            let quantity = f64::from(core.quantity);
            core.charges += charges_for(
                core.entry_price * quantity + request.exit_price * quantity,
                rate,
            );
            core.exit_price = Some(request.exit_price);
            core.closed_at = Some(now);
            core.trade_status = trade_status;

            if !tx.update_order_if_open(&order)? {
                return Err(TradingError::PositionAlreadyClosed(request.order_id.clone()));
            }

            let core = order.core();
            Ok(ClosedPosition {
                pnl: order.realized_pnl().unwrap_or_default(),
                trade_status,
                exit_price: request.exit_price,
                brokerage: core.brokerage,
                charges: core.charges,
                order: order.clone(),
            })
        })?;

        info!(
            "Closed position {} at {} ({}, pnl {:.2})",
            request.order_id, closed.exit_price, closed.trade_status, closed.pnl
        );
        Ok(closed)
    }
}

fn require_account(tx: &StoreTx<'_>, email: &str) -> Result<(), TradingError> {
    if tx.account_exists(email)? {
        Ok(())
    } else {
        Err(TradingError::AccountNotFound(email.to_string()))
    }
}

/// Load a non-trashed order of an account.
fn active_order(tx: &StoreTx<'_>, email: &str, order_id: &str) -> Result<Order, TradingError> {
    tx.get_order(email, order_id)?
        .filter(|stored| !stored.trashed)
        .map(|stored| stored.order)
        .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))
}

/// The single fill path shared by manual execution and the limit sweep.
///
/// Returns `None` if the order stopped being pending before this write.
fn fill_pending(
    tx: &StoreTx<'_>,
    mut order: Order,
    now: i64,
    executed_price: Option<f64>,
) -> Result<Option<Order>, TradingError> {
    order.fill(now, executed_price);
    if !tx.update_order_if_status(&order, OrderStatus::Pending)? {
        return Ok(None);
    }
    let email = order.core().email.clone();
    InventoryLedger::apply_fill(tx, &email, &fill_for_order(&order), now)?;
    Ok(Some(order))
}

fn require_text(field: &'static str, value: &str) -> Result<(), TradingError> {
    if value.trim().is_empty() {
        Err(TradingError::MissingField(field))
    } else {
        Ok(())
    }
}

fn require_positive(field: &'static str, value: Option<f64>) -> Result<(), TradingError> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(TradingError::InvalidField {
            field,
            reason: "must be a positive number".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_placement(request: &PlaceOrderRequest) -> Result<(Side, OrderType), TradingError> {
    require_text("email", &request.email)?;
    let side = request
        .direction
        .ok_or(TradingError::MissingField("direction"))?;
    let order_type = request
        .execution_type
        .ok_or(TradingError::MissingField("executionType"))?;
    if request.lot == 0 {
        return Err(TradingError::MissingField("lot"));
    }
    if request.quantity == 0 {
        return Err(TradingError::MissingField("quantity"));
    }
    if request.price == 0.0 {
        return Err(TradingError::MissingField("price"));
    }
    require_positive("price", Some(request.price))?;
    require_text("symbol", &request.symbol)?;
    require_text("market", &request.market)?;
    require_text("token", &request.token)?;
    require_text("exchange", &request.exchange)?;
    require_positive("stopLoss", request.stop_loss)?;
    require_positive("target", request.target)?;
    Ok((side, order_type))
}
