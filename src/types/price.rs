//! Price Types
//!
//! Ticks arrive from the external feed; the cache folds them into a quote that
//! also tracks the session range.

use serde::{Deserialize, Serialize};

/// A single price update from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    pub symbol: String,
    pub market: String,
    pub price: f64,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
}

/// Latest known state of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub market: String,
    /// Last traded price
    pub ltp: f64,
    /// Session high
    pub high: f64,
    /// Session low
    pub low: f64,
    pub open: f64,
    /// Previous close, when the feed reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    /// Time of the last tick (ms)
    pub updated_at: i64,
}

impl Quote {
    /// Start a quote from the first tick of a session.
    pub fn from_tick(tick: &PriceTick, now: i64) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            market: tick.market.clone(),
            ltp: tick.price,
            high: tick.high.unwrap_or(tick.price).max(tick.price),
            low: tick.low.unwrap_or(tick.price).min(tick.price),
            open: tick.open.unwrap_or(tick.price),
            close: tick.close,
            updated_at: now,
        }
    }

    /// Fold a later tick into this quote, widening the session range.
    pub fn apply(&mut self, tick: &PriceTick, now: i64) {
        self.ltp = tick.price;
        self.high = self.high.max(tick.price).max(tick.high.unwrap_or(f64::MIN));
        self.low = self.low.min(tick.price).min(tick.low.unwrap_or(f64::MAX));
        if let Some(open) = tick.open {
            self.open = open;
        }
        if tick.close.is_some() {
            self.close = tick.close;
        }
        self.updated_at = now;
    }
}
