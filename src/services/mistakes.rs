//! Mistake Detector
//!
//! Rule-based scan over an account's trades. Detections merge into a persisted,
//! deduplicated log.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::services::reconstructor::reconstruct;
use crate::services::{Clock, SqliteStore, TradingError};
use crate::types::{MistakeEntry, MistakeType, TradeRecord};

/// Outcome of merging entries into a mistake log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeSync {
    pub added: usize,
    pub total: usize,
    pub mistakes: Vec<MistakeEntry>,
}

/// Flag the trades in `trades` that break a rule.
///
/// `rapid_reentry_ms` is the window after a losing exit in which a new entry is
/// a rapid re-entry.
pub fn detect(trades: &[TradeRecord], rapid_reentry_ms: i64) -> Vec<MistakeEntry> {
    let mut sorted: Vec<&TradeRecord> = trades.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);

    let mut found = Vec::new();
    let mut previous: Option<&TradeRecord> = None;

    for trade in sorted {
        let flag = |mistake_type: MistakeType| MistakeEntry {
            trade_id: trade.trade_id.clone(),
            mistake_type,
            severity: mistake_type.severity(),
            impact: trade.pnl().abs(),
            symbol: trade.symbol.clone(),
            timestamp: trade.timestamp,
        };

        if trade.stop_loss.is_none() {
            found.push(flag(MistakeType::NoStopLoss));
        }
        if trade.risk_reward_ratio().is_some_and(|ratio| ratio < 1.0) {
            found.push(flag(MistakeType::PoorRrRatio));
        }
        if let Some(prev) = previous {
            let gap = trade.entry_time - prev.timestamp;
            if prev.pnl() < 0.0 && (0..rapid_reentry_ms).contains(&gap) {
                found.push(flag(MistakeType::RapidReentry));
            }
        }

        previous = Some(trade);
    }

    found
}

/// Per-account mistake log.
pub struct MistakeDetector {
    store: Arc<SqliteStore>,
    clock: Arc<dyn Clock>,
    rapid_reentry_ms: i64,
}

impl MistakeDetector {
    pub fn new(store: Arc<SqliteStore>, clock: Arc<dyn Clock>, rapid_reentry_minutes: i64) -> Self {
        Self {
            store,
            clock,
            rapid_reentry_ms: rapid_reentry_minutes * 60_000,
        }
    }

    pub fn log(&self, email: &str) -> Result<Vec<MistakeEntry>, TradingError> {
        self.store.read(|tx| {
            if !tx.account_exists(email)? {
                return Err(TradingError::AccountNotFound(email.to_string()));
            }
            Ok(tx.list_mistakes(email)?)
        })
    }

    /// Merge `entries` into the log, or rescan the account's trades when none are
    /// supplied. Entries already logged are skipped.
    pub fn sync(
        &self,
        email: &str,
        entries: Option<Vec<MistakeEntry>>,
    ) -> Result<MistakeSync, TradingError> {
        let now = self.clock.now_ms();
        let rapid_reentry_ms = self.rapid_reentry_ms;

        let result = self.store.transaction(|tx| {
            if !tx.account_exists(email)? {
                return Err(TradingError::AccountNotFound(email.to_string()));
            }

            let candidates = match entries {
                Some(entries) => entries,
                None => {
                    let orders = tx.filled_orders(email)?;
                    detect(&reconstruct(&orders).trades, rapid_reentry_ms)
                }
            };

            let mut added = 0;
            for entry in &candidates {
                if tx.insert_mistake(email, entry, now)? {
                    added += 1;
                }
            }

            let mistakes = tx.list_mistakes(email)?;
            Ok(MistakeSync {
                added,
                total: mistakes.len(),
                mistakes,
            })
        })?;

        info!(
            "Mistake log for {}: {} new, {} total",
            email, result.added, result.total
        );
        Ok(result)
    }
}
