//! Daily purge of pending limit orders at market-local midnight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::{Clock, TradingError, TradingService};

/// The first midnight in `offset` strictly after `now`.
pub fn next_midnight(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    now.with_timezone(&offset)
        .date_naive()
        .succ_opt()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}

pub struct DailyCleanup {
    trading: Arc<TradingService>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
}

impl DailyCleanup {
    pub fn new(trading: Arc<TradingService>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            trading,
            clock,
            offset,
            shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Purge now. Returns the number of orders removed.
    pub fn run_once(&self) -> Result<usize, TradingError> {
        self.trading.purge_pending_limit_orders()
    }

    fn until_next_run(&self) -> Duration {
        let now = self.clock.now();
        (next_midnight(now, self.offset) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let cleanup = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            loop {
                let wait = cleanup.until_next_run();
                info!("Next pending-order purge in {}s", wait.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(e) = cleanup.run_once() {
                            error!("Daily purge failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Daily cleanup received shutdown signal");
                        break;
                    }
                }
            }
            cleanup.running.store(false, Ordering::SeqCst);
        })
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostConfig;
    use crate::services::{ManualClock, SqliteStore};
    use crate::types::{OrderType, PlaceOrderRequest, Side};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_midnight_in_market_time() {
        // 15:30 IST on the 15th
        assert_eq!(next_midnight(utc(2024, 1, 15, 10, 0), ist()), utc(2024, 1, 15, 18, 30));
        // 01:30 IST on the 16th
        assert_eq!(next_midnight(utc(2024, 1, 15, 20, 0), ist()), utc(2024, 1, 16, 18, 30));
        // exactly midnight IST moves a full day on
        assert_eq!(next_midnight(utc(2024, 1, 15, 18, 30), ist()), utc(2024, 1, 16, 18, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_cleanup_purges_at_midnight() {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(utc(2024, 1, 15, 18, 29)));
        let trading = Arc::new(TradingService::new(store, clock.clone(), CostConfig::default()));

        for (order_type, price) in [(OrderType::Limit, 100.0), (OrderType::Market, 101.0)] {
            trading
                .place_order(PlaceOrderRequest {
                    email: "trader@example.com".to_string(),
                    direction: Some(Side::Buy),
                    execution_type: Some(order_type),
                    lot: 1,
                    price,
                    quantity: 10,
                    symbol: "GOLD".to_string(),
                    market: "MCX".to_string(),
                    exchange: "MCX".to_string(),
                    token: "1".to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        let cleanup = Arc::new(DailyCleanup::new(trading.clone(), clock, ist()));
        let handle = cleanup.spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(trading.orders("trader@example.com").unwrap().buy_orders.len(), 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        let orders = trading.orders("trader@example.com").unwrap();
        assert_eq!(orders.buy_orders.len(), 1);
        assert!(orders.buy_orders[0].is_filled());

        cleanup.stop();
        handle.await.unwrap();
        assert!(!cleanup.is_running());
    }
}
