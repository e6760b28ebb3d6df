use crate::services::Cache;
use crate::types::{PriceTick, Quote};
use std::time::Duration;
use tracing::debug;

/// Latest quote per instrument, keyed by `market:symbol`.
///
/// Quotes expire after the configured staleness window so the limit sweep and
/// the risk monitor never act on a price from a dead feed.
pub struct PriceCache {
    quotes: Cache<Quote>,
}

impl PriceCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            quotes: Cache::new(stale_after),
        }
    }

    fn key(market: &str, symbol: &str) -> String {
        format!("{}:{}", market, symbol)
    }

    /// Fold a tick into the cached quote and return the result.
    pub fn update(&self, tick: &PriceTick, now: i64) -> Quote {
        let quote = self
            .quotes
            .upsert(Self::key(&tick.market, &tick.symbol), |previous| {
                match previous {
                    Some(existing) => {
                        let mut quote = existing.clone();
                        quote.apply(tick, now);
                        quote
                    }
                    None => Quote::from_tick(tick, now),
                }
            });
        debug!(
            "Price {}:{} = {} (range {}..{})",
            quote.market, quote.symbol, quote.ltp, quote.low, quote.high
        );
        quote
    }

    pub fn quote(&self, market: &str, symbol: &str) -> Option<Quote> {
        self.quotes.get(&Self::key(market, symbol))
    }

    /// Last traded price, if a live quote exists.
    pub fn current_price(&self, market: &str, symbol: &str) -> Option<f64> {
        self.quote(market, symbol).map(|quote| quote.ltp)
    }

    /// Drop expired quotes.
    pub fn prune(&self) {
        self.quotes.cleanup();
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
