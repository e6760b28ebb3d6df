//! Analytics Engine
//!
//! Performance statistics over reconstructed or closed trades: P&L, win rate,
//! drawdown, equity curve, weekday and intraday breakdowns, and short textual
//! insights.

use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

use crate::services::reconstructor::{closed_trades, reconstruct};
use crate::services::{SqliteStore, TradingError};
use crate::types::{
    AnalyticsReport, BucketStat, EquityPoint, Order, PerformanceSummary, Reconstruction, TradeRecord,
    TradeSource,
};

/// Intraday windows as `(start hour, end hour)` in market time.
const TIME_WINDOWS: [(u32, u32); 4] = [(9, 11), (11, 13), (13, 15), (15, 17)];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Builds per-account analytics from stored orders.
pub struct AnalyticsEngine {
    store: Arc<SqliteStore>,
    market_offset: FixedOffset,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<SqliteStore>, market_offset: FixedOffset) -> Self {
        Self {
            store,
            market_offset,
        }
    }

    /// FIFO reconstruction of an account's filled orders.
    pub fn reconstruction(&self, email: &str) -> Result<Reconstruction, TradingError> {
        let orders = self.filled_orders(email)?;
        Ok(reconstruct(&orders))
    }

    /// Trades for `source`, oldest first.
    pub fn trades(&self, email: &str, source: TradeSource) -> Result<Vec<TradeRecord>, TradingError> {
        let orders = self.filled_orders(email)?;
        Ok(match source {
            TradeSource::Fifo => reconstruct(&orders).trades,
            TradeSource::Closed => closed_trades(&orders),
        })
    }

    pub fn report(&self, email: &str, source: TradeSource) -> Result<AnalyticsReport, TradingError> {
        let trades = self.trades(email, source)?;
        Ok(build_report(source, trades, self.market_offset))
    }

    fn filled_orders(&self, email: &str) -> Result<Vec<Order>, TradingError> {
        self.store.read(|tx| {
            if !tx.account_exists(email)? {
                return Err(TradingError::AccountNotFound(email.to_string()));
            }
            Ok(tx.filled_orders(email)?)
        })
    }
}

/// Assemble a full report from a set of trades.
pub fn build_report(
    source: TradeSource,
    trades: Vec<TradeRecord>,
    offset: FixedOffset,
) -> AnalyticsReport {
    let summary = summarize(&trades);
    let by_weekday = by_weekday(&trades, offset);
    let by_time_window = by_time_window(&trades, offset);
    let insights = insights(&summary, &by_weekday, &by_time_window);

    AnalyticsReport {
        source,
        equity_curve: equity_curve(&trades),
        summary,
        by_weekday,
        by_time_window,
        insights,
        trades,
    }
}

pub fn summarize(trades: &[TradeRecord]) -> PerformanceSummary {
    let gross_pnl: f64 = trades.iter().map(TradeRecord::pnl).sum();
    let total_costs: f64 = trades.iter().map(TradeRecord::costs).sum();

    let with_outcome: Vec<f64> = trades
        .iter()
        .filter(|t| t.outcome.is_some_and(|o| o.is_outcome()))
        .map(TradeRecord::pnl)
        .collect();
    let wins: Vec<f64> = with_outcome.iter().copied().filter(|pnl| *pnl > 0.0).collect();
    let losses: Vec<f64> = with_outcome.iter().copied().filter(|pnl| *pnl < 0.0).collect();

    let win_rate = if with_outcome.is_empty() {
        0.0
    } else {
        wins.len() as f64 / with_outcome.len() as f64 * 100.0
    };
    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum();

    PerformanceSummary {
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate,
        gross_pnl,
        total_costs,
        net_pnl: gross_pnl - total_costs,
        max_drawdown: max_drawdown(trades),
        avg_win: mean(&wins),
        avg_loss: mean(&losses),
        profit_factor: (gross_loss < 0.0).then(|| gross_profit / gross_loss.abs()),
        best_trade: trades.iter().map(TradeRecord::pnl).reduce(f64::max),
        worst_trade: trades.iter().map(TradeRecord::pnl).reduce(f64::min),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn by_time(trades: &[TradeRecord]) -> Vec<&TradeRecord> {
    let mut sorted: Vec<&TradeRecord> = trades.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);
    sorted
}

/// Largest fall of cumulative gross P&L from its running peak. The peak starts at 0.
pub fn max_drawdown(trades: &[TradeRecord]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for trade in by_time(trades) {
        cumulative += trade.pnl();
        peak = peak.max(cumulative);
        worst = worst.max(peak - cumulative);
    }
    worst
}

/// Running net P&L, one point per trade.
pub fn equity_curve(trades: &[TradeRecord]) -> Vec<EquityPoint> {
    let mut equity = 0.0;
    by_time(trades)
        .into_iter()
        .map(|trade| {
            let pnl = trade.net_pnl();
            equity += pnl;
            EquityPoint {
                timestamp: trade.timestamp,
                pnl,
                equity,
            }
        })
        .collect()
}

fn market_time(ms: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&offset))
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// P&L and count per weekday of entry, Monday first.
pub fn by_weekday(trades: &[TradeRecord], offset: FixedOffset) -> Vec<BucketStat> {
    let mut buckets: Vec<BucketStat> = WEEKDAYS
        .iter()
        .map(|day| BucketStat {
            label: weekday_label(*day).to_string(),
            pnl: 0.0,
            count: 0,
        })
        .collect();

    for trade in trades {
        if let Some(at) = market_time(trade.entry_time, offset) {
            let bucket = &mut buckets[at.weekday().num_days_from_monday() as usize];
            bucket.pnl += trade.pnl();
            bucket.count += 1;
        }
    }
    buckets
}

/// P&L and count per two-hour session window of entry. Entries outside the
/// windows are not counted.
pub fn by_time_window(trades: &[TradeRecord], offset: FixedOffset) -> Vec<BucketStat> {
    let mut buckets: Vec<BucketStat> = TIME_WINDOWS
        .iter()
        .map(|(start, end)| BucketStat {
            label: format!("{:02}:00-{:02}:00", start, end),
            pnl: 0.0,
            count: 0,
        })
        .collect();

    for trade in trades {
        let Some(at) = market_time(trade.entry_time, offset) else {
            continue;
        };
        let hour = at.hour();
        if let Some(index) = TIME_WINDOWS
            .iter()
            .position(|(start, end)| hour >= *start && hour < *end)
        {
            buckets[index].pnl += trade.pnl();
            buckets[index].count += 1;
        }
    }
    buckets
}

/// Short observations drawn from the summary and breakdowns.
pub fn insights(
    summary: &PerformanceSummary,
    weekdays: &[BucketStat],
    windows: &[BucketStat],
) -> Vec<String> {
    if summary.total_trades == 0 {
        return vec!["No closed trades yet.".to_string()];
    }

    let mut notes = Vec::new();
    let traded_days = || weekdays.iter().filter(|b| b.count > 0);

    if let Some(best) = traded_days().max_by(|a, b| a.pnl.total_cmp(&b.pnl)) {
        if best.pnl > 0.0 {
            notes.push(format!("Best day: {} ({:+.2}).", best.label, best.pnl));
        }
    }
    if let Some(worst) = traded_days().min_by(|a, b| a.pnl.total_cmp(&b.pnl)) {
        if worst.pnl < 0.0 {
            notes.push(format!("Worst day: {} ({:+.2}).", worst.label, worst.pnl));
        }
    }
    if let Some(window) = windows
        .iter()
        .filter(|b| b.count > 0 && b.pnl < 0.0)
        .min_by(|a, b| a.pnl.total_cmp(&b.pnl))
    {
        notes.push(format!(
            "Losses concentrate in the {} window ({:+.2}).",
            window.label, window.pnl
        ));
    }

    if summary.win_rate < 40.0 {
        notes.push(format!(
            "Win rate is {:.1}%; review entry criteria.",
            summary.win_rate
        ));
    } else if summary.win_rate >= 60.0 {
        notes.push(format!("Win rate is a strong {:.1}%.", summary.win_rate));
    }

    if summary.gross_pnl > 0.0 && summary.total_costs / summary.gross_pnl > 0.25 {
        notes.push(format!(
            "Costs consumed {:.0}% of gross profit.",
            summary.total_costs / summary.gross_pnl * 100.0
        ));
    }

    notes
}
