//! Mistake Log Types

use serde::{Deserialize, Serialize};

/// Rule that flagged a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MistakeType {
    /// Entered without a stop loss
    NoStopLoss,
    /// Target closer than the stop
    PoorRrRatio,
    /// Re-entered shortly after a losing trade
    RapidReentry,
}

impl std::fmt::Display for MistakeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MistakeType::NoStopLoss => write!(f, "NO_STOP_LOSS"),
            MistakeType::PoorRrRatio => write!(f, "POOR_RR_RATIO"),
            MistakeType::RapidReentry => write!(f, "RAPID_REENTRY"),
        }
    }
}

impl MistakeType {
    pub fn severity(self) -> Severity {
        match self {
            MistakeType::NoStopLoss => Severity::High,
            MistakeType::PoorRrRatio | MistakeType::RapidReentry => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One flagged trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    pub mistake_type: MistakeType,
    pub severity: Severity,
    /// Absolute P&L of the flagged trade
    pub impact: f64,
    pub symbol: String,
    /// Trade timestamp (ms)
    pub timestamp: i64,
}

impl MistakeEntry {
    /// Identity used to keep the log free of duplicates.
    pub fn dedup_key(&self) -> String {
        match &self.trade_id {
            Some(trade_id) => format!("trade:{}:{}", trade_id, self.mistake_type),
            None => format!("at:{}:{}:{}", self.timestamp, self.symbol, self.mistake_type),
        }
    }
}

/// Body of a mistake-log sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMistakesRequest {
    pub email: String,
    /// Entries to merge; when absent the log is rebuilt from the account's trades
    #[serde(default)]
    pub mistakes: Option<Vec<MistakeEntry>>,
}
