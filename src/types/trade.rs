//! Round-trip trade records derived from orders. Never persisted.

use serde::{Deserialize, Serialize};

use super::{position_pnl, Order, Side, TradeStatus};

/// A realized round trip: an entry leg matched against an exit leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// `<entry order id>:<exit order id>` for matched legs, the order id for closed orders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    pub symbol: String,
    /// Side of the entry leg
    pub side: Side,
    pub quantity: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Entry fill time (ms)
    pub entry_time: i64,
    /// Exit fill time (ms)
    pub timestamp: i64,
    pub brokerage: f64,
    pub charges: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TradeStatus>,
}

impl TradeRecord {
    /// Gross P&L before costs.
    pub fn pnl(&self) -> f64 {
        position_pnl(self.side, self.entry_price, self.exit_price, self.quantity)
    }

    pub fn costs(&self) -> f64 {
        self.brokerage + self.charges
    }

    pub fn net_pnl(&self) -> f64 {
        self.pnl() - self.costs()
    }

    /// Reward over risk implied by the entry leg's stop loss and target.
    ///
    /// `None` when either level is missing or the stop sits on the wrong side of
    /// the entry.
    pub fn risk_reward_ratio(&self) -> Option<f64> {
        let stop_loss = self.stop_loss?;
        let target = self.target?;
        let (risk, reward) = match self.side {
            Side::Buy => (self.entry_price - stop_loss, target - self.entry_price),
            Side::Sell => (stop_loss - self.entry_price, self.entry_price - target),
        };
        if risk <= 0.0 {
            return None;
        }
        Some(reward / risk)
    }

    /// Map a closed order into a trade record.
    pub fn from_closed_order(order: &Order) -> Option<Self> {
        let core = order.core();
        let exit_price = core.exit_price?;
        Some(Self {
            trade_id: Some(core.id.clone()),
            symbol: core.symbol.clone(),
            side: order.side(),
            quantity: core.quantity,
            entry_price: core.entry_price,
            exit_price,
            entry_time: order.fill_time(),
            timestamp: core.closed_at.unwrap_or_else(|| order.fill_time()),
            brokerage: core.brokerage,
            charges: core.charges,
            stop_loss: core.stop_loss,
            target: core.target,
            outcome: Some(core.trade_status),
        })
    }
}

/// Unmatched quantity left on a symbol's FIFO queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLot {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub price: f64,
    pub timestamp: i64,
}

/// Output of FIFO reconstruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconstruction {
    pub trades: Vec<TradeRecord>,
    pub open_lots: Vec<OpenLot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(side: Side, entry: f64, exit: f64, quantity: u32) -> TradeRecord {
        TradeRecord {
            trade_id: None,
            symbol: "CRUDEOIL".to_string(),
            side,
            quantity,
            entry_price: entry,
            exit_price: exit,
            entry_time: 0,
            timestamp: 0,
            brokerage: 40.0,
            charges: 10.0,
            stop_loss: None,
            target: None,
            outcome: Some(TradeStatus::Completed),
        }
    }

    #[test]
    fn test_pnl_and_net() {
        let trade = record(Side::Buy, 5850.0, 5920.0, 100);
        assert_eq!(trade.pnl(), 7000.0);
        assert_eq!(trade.net_pnl(), 6950.0);

        let short = record(Side::Sell, 6450.0, 6380.0, 100);
        assert_eq!(short.pnl(), 7000.0);
    }

    #[test]
    fn test_risk_reward_ratio() {
        let mut long = record(Side::Buy, 100.0, 0.0, 1);
        long.stop_loss = Some(95.0);
        long.target = Some(115.0);
        assert_eq!(long.risk_reward_ratio(), Some(3.0));

        let mut short = record(Side::Sell, 100.0, 0.0, 1);
        short.stop_loss = Some(110.0);
        short.target = Some(95.0);
        assert_eq!(short.risk_reward_ratio(), Some(0.5));
    }

    #[test]
    fn test_risk_reward_ratio_undefined() {
        let mut trade = record(Side::Buy, 100.0, 0.0, 1);
        assert_eq!(trade.risk_reward_ratio(), None);

        trade.target = Some(120.0);
        assert_eq!(trade.risk_reward_ratio(), None);

        // stop above a long entry
        trade.stop_loss = Some(101.0);
        assert_eq!(trade.risk_reward_ratio(), None);
    }
}
