//! Inventory Types
//!
//! Per-account holdings keyed by `(symbol, exchange)`, valued at weighted-average
//! cost. Sells remove `avg_buy_price * quantity` from the carried value, so the
//! average of the remaining holding never moves on a sale.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Side;

/// A holding of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub email: String,
    pub symbol: String,
    pub exchange: String,
    pub market: String,
    pub token: String,
    pub lots: u32,
    pub quantity: u32,
    /// Cost of the quantity currently held
    pub total_value: f64,
    pub avg_buy_price: f64,
    /// Last change (ms)
    pub last_updated: i64,
}

/// A fill to apply to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFill {
    pub symbol: String,
    pub exchange: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub token: String,
    pub lots: u32,
    pub quantity: u32,
    pub price: f64,
    pub side: Side,
}

/// A buy would push a holding past what the counters can represent.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("holding {held_lots} lots / {held_quantity} qty cannot absorb {added_lots} lots / {added_quantity} qty")]
pub struct InventoryOverflow {
    pub held_lots: u32,
    pub held_quantity: u32,
    pub added_lots: u32,
    pub added_quantity: u32,
}

/// A sell asked for more than the account holds.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("holding {held_lots} lots / {held_quantity} qty, requested {requested_lots} lots / {requested_quantity} qty")]
pub struct InventoryShortfall {
    pub held_lots: u32,
    pub held_quantity: u32,
    pub requested_lots: u32,
    pub requested_quantity: u32,
}

impl InventoryItem {
    /// Open a new holding from a buy fill.
    pub fn open(email: &str, fill: &InventoryFill, now: i64) -> Self {
        Self {
            email: email.to_string(),
            symbol: fill.symbol.clone(),
            exchange: fill.exchange.clone(),
            market: fill.market.clone(),
            token: fill.token.clone(),
            lots: fill.lots,
            quantity: fill.quantity,
            total_value: fill.price * f64::from(fill.quantity),
            avg_buy_price: fill.price,
            last_updated: now,
        }
    }

    /// Add a buy fill, re-averaging the cost. Leaves the item untouched on overflow.
    pub fn apply_buy(
        &mut self,
        lots: u32,
        quantity: u32,
        price: f64,
        now: i64,
    ) -> Result<(), InventoryOverflow> {
        let (Some(new_lots), Some(new_quantity)) =
            (self.lots.checked_add(lots), self.quantity.checked_add(quantity))
        else {
            return Err(InventoryOverflow {
                held_lots: self.lots,
                held_quantity: self.quantity,
                added_lots: lots,
                added_quantity: quantity,
            });
        };

        self.lots = new_lots;
        self.quantity = new_quantity;
        self.total_value += price * f64::from(quantity);
        self.recompute_average();
        self.last_updated = now;
        Ok(())
    }

    /// Remove a sell fill at average cost. Leaves the item untouched on shortfall.
    pub fn apply_sell(
        &mut self,
        lots: u32,
        quantity: u32,
        now: i64,
    ) -> Result<(), InventoryShortfall> {
        if self.lots == 0 || lots > self.lots || quantity > self.quantity {
            return Err(InventoryShortfall {
                held_lots: self.lots,
                held_quantity: self.quantity,
                requested_lots: lots,
                requested_quantity: quantity,
            });
        }

        let removed_cost = self.avg_buy_price * f64::from(quantity);
        self.lots -= lots;
        self.quantity -= quantity;
        self.total_value = if self.quantity == 0 {
            0.0
        } else {
            (self.total_value - removed_cost).max(0.0)
        };
        self.recompute_average();
        self.last_updated = now;
        Ok(())
    }

    /// Whether the ledger should drop this holding.
    pub fn is_exhausted(&self) -> bool {
        self.lots == 0
    }

    fn recompute_average(&mut self) {
        self.avg_buy_price = if self.quantity > 0 {
            self.total_value / f64::from(self.quantity)
        } else {
            0.0
        };
    }
}

/// Request body for a direct ledger update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryRequest {
    pub email: String,
    pub symbol: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub token: String,
    pub lots: u32,
    pub quantity: u32,
    pub price: f64,
    pub action: Side,
}

impl UpdateInventoryRequest {
    pub fn to_fill(&self) -> InventoryFill {
        InventoryFill {
            symbol: self.symbol.clone(),
            exchange: if self.exchange.is_empty() {
                self.market.clone()
            } else {
                self.exchange.clone()
            },
            market: self.market.clone(),
            token: self.token.clone(),
            lots: self.lots,
            quantity: self.quantity,
            price: self.price,
            side: self.action,
        }
    }
}
