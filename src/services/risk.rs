//! Risk Monitor
//!
//! Counts pending orders whose limit price sits outside the instrument's live
//! session range and compares the count against the account's cap. The result
//! is advisory; placement never consults it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::services::{Clock, PriceCache, SqliteStore, TradingError};
use crate::types::{Order, Quote, RiskReport, RiskSettings, RiskStatus, Side};

/// Whether a pending order is high-risk against the live quote.
///
/// A buy is high-risk once the session low has moved above its price; a sell
/// once its price is above the session high.
pub fn is_high_risk(order: &Order, quote: &Quote) -> bool {
    let price = order.core().entry_price;
    match order.side() {
        Side::Buy => quote.low > price,
        Side::Sell => price > quote.high,
    }
}

/// Evaluate `pending` against live quotes. Orders without a quote are skipped.
pub fn evaluate<F>(pending: &[Order], max_high_risk_trades: u32, quote_for: F) -> RiskReport
where
    F: Fn(&Order) -> Option<Quote>,
{
    let mut evaluated_orders = 0;
    let mut high_risk_orders = Vec::new();

    for order in pending.iter().filter(|order| order.is_pending()) {
        let Some(quote) = quote_for(order) else {
            continue;
        };
        evaluated_orders += 1;
        if is_high_risk(order, &quote) {
            high_risk_orders.push(order.id().to_string());
        }
    }

    let high_risk_count = high_risk_orders.len() as u32;
    RiskReport {
        status: if high_risk_count > max_high_risk_trades {
            RiskStatus::Locked
        } else {
            RiskStatus::Safe
        },
        high_risk_count,
        max_high_risk_trades,
        evaluated_orders,
        high_risk_orders,
    }
}

pub struct RiskMonitor {
    store: Arc<SqliteStore>,
    prices: Arc<PriceCache>,
    clock: Arc<dyn Clock>,
    default_max_high_risk_trades: u32,
}

impl RiskMonitor {
    pub fn new(
        store: Arc<SqliteStore>,
        prices: Arc<PriceCache>,
        clock: Arc<dyn Clock>,
        default_max_high_risk_trades: u32,
    ) -> Self {
        Self {
            store,
            prices,
            clock,
            default_max_high_risk_trades,
        }
    }

    /// Stored settings, or the defaults for an account that never saved any.
    pub fn settings(&self, email: &str) -> Result<RiskSettings, TradingError> {
        self.store.read(|tx| {
            if !tx.account_exists(email)? {
                return Err(TradingError::AccountNotFound(email.to_string()));
            }
            Ok(tx
                .get_risk_settings(email)?
                .unwrap_or_else(|| RiskSettings::new(email, self.default_max_high_risk_trades)))
        })
    }

    pub fn update_settings(
        &self,
        email: &str,
        max_high_risk_trades: u32,
    ) -> Result<RiskSettings, TradingError> {
        let settings = RiskSettings {
            email: email.to_string(),
            max_high_risk_trades,
            updated_at: self.clock.now_ms(),
        };
        self.store.transaction(|tx| {
            if !tx.account_exists(email)? {
                return Err(TradingError::AccountNotFound(email.to_string()));
            }
            tx.save_risk_settings(&settings)?;
            Ok(())
        })?;
        info!("Risk limit for {} set to {}", email, max_high_risk_trades);
        Ok(settings)
    }

    pub fn status(&self, email: &str) -> Result<RiskReport, TradingError> {
        let settings = self.settings(email)?;
        let pending = self.store.read(|tx| tx.pending_orders(email))?;

        let report = evaluate(&pending, settings.max_high_risk_trades, |order| {
            let core = order.core();
            self.prices.quote(&core.market, &core.symbol)
        });
        debug!(
            "Risk for {}: {} of {} evaluated orders high-risk ({:?})",
            email, report.high_risk_count, report.evaluated_orders, report.status
        );
        Ok(report)
    }
}
