//! Analytics Types

use serde::{Deserialize, Serialize};

use super::TradeRecord;

/// Headline performance numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage of trades with an outcome that made money
    pub win_rate: f64,
    pub gross_pnl: f64,
    pub total_costs: f64,
    pub net_pnl: f64,
    pub max_drawdown: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Gross profit over gross loss; `None` when there are no losses
    pub profit_factor: Option<f64>,
    pub best_trade: Option<f64>,
    pub worst_trade: Option<f64>,
}

/// Point on the net equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub timestamp: i64,
    /// Net P&L of this trade
    pub pnl: f64,
    /// Running net P&L
    pub equity: f64,
}

/// Aggregate for one bucket (weekday or time window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStat {
    pub label: String,
    pub pnl: f64,
    pub count: usize,
}

/// Which records the report was built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSource {
    /// FIFO-matched order legs
    #[default]
    Fifo,
    /// Orders closed through the position closer
    Closed,
}

/// Full analytics report for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub source: TradeSource,
    pub summary: PerformanceSummary,
    pub equity_curve: Vec<EquityPoint>,
    pub by_weekday: Vec<BucketStat>,
    pub by_time_window: Vec<BucketStat>,
    pub insights: Vec<String>,
    pub trades: Vec<TradeRecord>,
}
