use std::env;

use chrono::{FixedOffset, Offset, Utc};

/// Trading cost configuration.
#[derive(Debug, Clone)]
pub struct CostConfig {
    /// Flat brokerage charged per order.
    pub brokerage_per_order: f64,
    /// Charge rate applied to traded notional (0.0001 = 1 bp).
    pub charge_rate: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            brokerage_per_order: 20.0,
            charge_rate: 0.0001,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between limit order sweeps (seconds).
    pub limit_sweep_interval_secs: u64,
    /// How long a cached quote stays usable (seconds).
    pub price_stale_secs: u64,
    /// Market timezone as minutes east of UTC; drives the midnight purge
    /// and weekday/time-window analytics.
    pub market_utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            limit_sweep_interval_secs: 5,
            price_stale_secs: 300,
            market_utc_offset_minutes: 330,
        }
    }
}

impl SchedulerConfig {
    /// Market timezone offset, falling back to UTC on an out-of-range value.
    pub fn market_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.market_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Trade review configuration.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Default cap on high-risk pending orders for accounts without settings.
    pub default_max_high_risk_trades: u32,
    /// Window after a losing trade in which a new entry counts as rapid re-entry.
    pub rapid_reentry_minutes: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_max_high_risk_trades: crate::types::DEFAULT_MAX_HIGH_RISK_TRADES,
            rapid_reentry_minutes: 5,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    pub costs: CostConfig,
    pub scheduler: SchedulerConfig,
    pub review: ReviewConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let costs = CostConfig::default();
        let scheduler = SchedulerConfig::default();
        let review = ReviewConfig::default();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "tradebook.db".to_string()),
            costs: CostConfig {
                brokerage_per_order: env::var("BROKERAGE_PER_ORDER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(costs.brokerage_per_order),
                charge_rate: env::var("CHARGE_RATE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(costs.charge_rate),
            },
            scheduler: SchedulerConfig {
                limit_sweep_interval_secs: env::var("LIMIT_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(scheduler.limit_sweep_interval_secs),
                price_stale_secs: env::var("PRICE_STALE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(scheduler.price_stale_secs),
                market_utc_offset_minutes: env::var("MARKET_UTC_OFFSET_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(scheduler.market_utc_offset_minutes),
            },
            review: ReviewConfig {
                default_max_high_risk_trades: env::var("DEFAULT_MAX_HIGH_RISK_TRADES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(review.default_max_high_risk_trades),
                rapid_reentry_minutes: env::var("RAPID_REENTRY_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(review.rapid_reentry_minutes),
            },
        }
    }

    /// Configuration with every default, ignoring the environment.
    pub fn defaults() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "tradebook.db".to_string(),
            costs: CostConfig::default(),
            scheduler: SchedulerConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
