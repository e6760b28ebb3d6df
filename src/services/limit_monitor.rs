//! Limit Order Monitor
//!
//! Sweeps pending limit orders against cached prices on a fixed interval. Each
//! triggered order goes through the trading service's fill path, so the
//! inventory ledger sees it exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::services::{PriceCache, TradingError, TradingService};
use crate::types::Order;

pub struct LimitOrderMonitor {
    trading: Arc<TradingService>,
    prices: Arc<PriceCache>,
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
    sweeps: AtomicU64,
}

impl LimitOrderMonitor {
    pub fn new(trading: Arc<TradingService>, prices: Arc<PriceCache>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            trading,
            prices,
            interval,
            shutdown_tx,
            running: AtomicBool::new(false),
            sweeps: AtomicU64::new(0),
        }
    }

    /// Run one sweep over every instrument with pending limit orders.
    ///
    /// Instruments without a live cached price are skipped this round.
    pub fn tick(&self) -> Result<Vec<Order>, TradingError> {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.prices.prune();

        let mut executed = Vec::new();
        for (market, symbol) in self.trading.pending_limit_pairs()? {
            let Some(price) = self.prices.current_price(&market, &symbol) else {
                debug!("No live price for {}:{}, skipping", market, symbol);
                continue;
            };
            executed.extend(self.trading.check_limit_orders(&market, &symbol, price)?);
        }

        if !executed.is_empty() {
            info!("Limit sweep filled {} orders", executed.len());
        }
        Ok(executed)
    }

    /// Start sweeping in the background. The first sweep runs immediately.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::SeqCst);
        info!("Limit order monitor started ({:?} interval)", self.interval);

        tokio::spawn(async move {
            let mut ticker = interval(monitor.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = monitor.tick() {
                            error!("Limit sweep failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Limit order monitor received shutdown signal");
                        break;
                    }
                }
            }
            monitor.running.store(false, Ordering::SeqCst);
        })
    }

    /// Signal the background loop to exit.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of sweeps run so far.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }
}
