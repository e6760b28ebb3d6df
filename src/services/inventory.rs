//! Inventory Ledger
//!
//! Applies fills to per-account holdings. Order execution calls into the ledger
//! from inside its own transaction; the direct `update` path opens one itself.

use std::sync::Arc;

use tracing::{debug, info};

use crate::services::{Clock, SqliteStore, StoreTx, TradingError};
use crate::types::{InventoryFill, InventoryItem, Order, Side, UpdateInventoryRequest};

/// Per-account holdings at weighted-average cost.
pub struct InventoryLedger {
    store: Arc<SqliteStore>,
    clock: Arc<dyn Clock>,
}

impl InventoryLedger {
    pub fn new(store: Arc<SqliteStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply a fill on behalf of a user and return their full inventory.
    pub fn update(&self, request: &UpdateInventoryRequest) -> Result<Vec<InventoryItem>, TradingError> {
        if request.email.trim().is_empty() {
            return Err(TradingError::MissingField("email"));
        }
        if request.symbol.trim().is_empty() {
            return Err(TradingError::MissingField("symbol"));
        }
        if request.exchange.is_empty() && request.market.is_empty() {
            return Err(TradingError::MissingField("exchange"));
        }
        if request.lots == 0 {
            return Err(TradingError::MissingField("lots"));
        }
        if request.quantity == 0 {
            return Err(TradingError::MissingField("quantity"));
        }
        if request.action == Side::Buy && !(request.price.is_finite() && request.price > 0.0) {
            return Err(TradingError::InvalidField {
                field: "price",
                reason: "must be a positive number".to_string(),
            });
        }

        let now = self.clock.now_ms();
        let fill = request.to_fill();
        self.store.transaction(|tx| {
            tx.ensure_account(&request.email, now)?;
            Self::apply_fill(tx, &request.email, &fill, now)?;
            Ok(tx.list_inventory(&request.email)?)
        })
    }

    /// Holdings of an account.
    pub fn list(&self, email: &str) -> Result<Vec<InventoryItem>, TradingError> {
        self.store.read(|tx| {
            if !tx.account_exists(email)? {
                return Err(TradingError::AccountNotFound(email.to_string()));
            }
            Ok(tx.list_inventory(email)?)
        })
    }

    /// Apply one fill inside an open transaction.
    ///
    /// Returns the updated holding, or `None` when a sell emptied it.
    pub fn apply_fill(
        tx: &StoreTx<'_>,
        email: &str,
        fill: &InventoryFill,
        now: i64,
    ) -> Result<Option<InventoryItem>, TradingError> {
        let existing = tx.get_inventory_item(email, &fill.symbol, &fill.exchange)?;

        match fill.side {
            Side::Buy => {
                let item = match existing {
                    Some(mut item) => {
                        item.apply_buy(fill.lots, fill.quantity, fill.price, now)
                            .map_err(|overflow| TradingError::InvalidField {
                                field: "quantity",
                                reason: overflow.to_string(),
                            })?;
                        item
                    }
                    None => InventoryItem::open(email, fill, now),
                };
                tx.upsert_inventory_item(&item)?;
                debug!(
                    "Inventory {} {}@{}: {} lots, avg {:.2}",
                    email, item.symbol, item.exchange, item.lots, item.avg_buy_price
                );
                Ok(Some(item))
            }
            Side::Sell => {
                let mut item = existing.ok_or_else(|| TradingError::InsufficientInventory {
                    symbol: fill.symbol.clone(),
                    detail: "no holding".to_string(),
                })?;
                item.apply_sell(fill.lots, fill.quantity, now)
                    .map_err(|shortfall| TradingError::InsufficientInventory {
                        symbol: fill.symbol.clone(),
                        detail: shortfall.to_string(),
                    })?;

                if item.is_exhausted() {
                    tx.delete_inventory_item(email, &item.symbol, &item.exchange)?;
                    info!("Inventory {} {}@{} closed out", email, item.symbol, item.exchange);
                    Ok(None)
                } else {
                    tx.upsert_inventory_item(&item)?;
                    Ok(Some(item))
                }
            }
        }
    }

    /// Fail unless the account holds at least `lots` lots of the instrument.
    pub fn ensure_coverage(
        tx: &StoreTx<'_>,
        email: &str,
        symbol: &str,
        exchange: &str,
        lots: u32,
    ) -> Result<(), TradingError> {
        match tx.get_inventory_item(email, symbol, exchange)? {
            Some(item) if item.lots > 0 && item.lots >= lots => Ok(()),
            Some(item) => Err(TradingError::InsufficientInventory {
                symbol: symbol.to_string(),
                detail: format!("holding {} lots, requested {}", item.lots, lots),
            }),
            None => Err(TradingError::InsufficientInventory {
                symbol: symbol.to_string(),
                detail: "no holding".to_string(),
            }),
        }
    }
}

/// The ledger fill implied by filling `order` at its own price.
pub fn fill_for_order(order: &Order) -> InventoryFill {
    let core = order.core();
    InventoryFill {
        symbol: core.symbol.clone(),
        exchange: order.inventory_exchange().to_string(),
        market: core.market.clone(),
        token: core.token.clone(),
        lots: core.lot,
        quantity: core.quantity,
        price: core.price,
        side: order.side(),
    }
}
