//! Risk Types

use serde::{Deserialize, Serialize};

/// Default cap on simultaneous high-risk pending orders.
pub const DEFAULT_MAX_HIGH_RISK_TRADES: u32 = 5;

/// Per-account risk settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSettings {
    pub email: String,
    pub max_high_risk_trades: u32,
    /// Last change (ms)
    #[serde(default)]
    pub updated_at: i64,
}

impl RiskSettings {
    pub fn new(email: &str, max_high_risk_trades: u32) -> Self {
        Self {
            email: email.to_string(),
            max_high_risk_trades,
            updated_at: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Safe,
    Locked,
}

/// Outcome of a risk evaluation. Advisory; never blocks placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub status: RiskStatus,
    pub high_risk_count: u32,
    pub max_high_risk_trades: u32,
    /// Pending orders that had live price data
    pub evaluated_orders: usize,
    pub high_risk_orders: Vec<String>,
}

/// Body for updating risk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRiskSettingsRequest {
    pub email: String,
    pub max_high_risk_trades: u32,
}
