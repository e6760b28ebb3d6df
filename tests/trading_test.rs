//! End-to-end tests for the paper trading engine
//!
//! Tests cover:
//! - Inventory ledger and cost basis
//! - Order placement, execution and the limit sweep
//! - Cancellation and trash
//! - Position closing and P&L
//! - FIFO trade reconstruction and analytics
//! - Mistake detection and risk status

use std::sync::Arc;

use tradebook::config::Config;
use tradebook::services::analytics::max_drawdown;
use tradebook::services::reconstructor::reconstruct;
use tradebook::services::{ErrorKind, ExecutionOutcome, ManualClock, SqliteStore, TradingError};
use tradebook::types::*;
use tradebook::AppState;

const EMAIL: &str = "trader@example.com";
const START_MS: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60_000;

fn setup() -> (AppState, Arc<ManualClock>) {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let clock = Arc::new(ManualClock::at_ms(START_MS));
    let state = AppState::new(Config::defaults(), store, clock.clone());
    (state, clock)
}

fn order_request(side: Side, order_type: OrderType, quantity: u32, price: f64) -> PlaceOrderRequest {
    PlaceOrderRequest {
        email: EMAIL.to_string(),
        direction: Some(side),
        execution_type: Some(order_type),
        lot: 1,
        price,
        quantity,
        symbol: "NIFTY".to_string(),
        market: "NFO".to_string(),
        exchange: "NSE".to_string(),
        token: "35001".to_string(),
        ..Default::default()
    }
}

fn inventory_request(action: Side, lots: u32, quantity: u32, price: f64) -> UpdateInventoryRequest {
    UpdateInventoryRequest {
        email: EMAIL.to_string(),
        symbol: "NIFTY".to_string(),
        exchange: "NSE".to_string(),
        market: "NFO".to_string(),
        token: "35001".to_string(),
        lots,
        quantity,
        price,
        action,
    }
}

// =============================================================================
// Inventory Tests
// =============================================================================

mod inventory_tests {
    use super::*;

    #[test]
    fn test_average_price_tracks_total_value() {
        let (state, _) = setup();

        for (quantity, price) in [(50, 100.0), (30, 120.0), (20, 90.0)] {
            let items = state
                .inventory
                .update(&inventory_request(Side::Buy, 1, quantity, price))
                .unwrap();
            let item = &items[0];
            assert!((item.avg_buy_price - item.total_value / f64::from(item.quantity)).abs() < 1e-9);
        }

        let items = state.inventory.list(EMAIL).unwrap();
        assert_eq!(items[0].lots, 3);
        assert_eq!(items[0].quantity, 100);
        assert_eq!(items[0].total_value, 5000.0 + 3600.0 + 1800.0);
    }

    #[test]
    fn test_oversell_is_rejected_and_inventory_unchanged() {
        let (state, _) = setup();
        state
            .inventory
            .update(&inventory_request(Side::Buy, 2, 100, 100.0))
            .unwrap();
        let before = state.inventory.list(EMAIL).unwrap();

        let err = state
            .inventory
            .update(&inventory_request(Side::Sell, 3, 150, 110.0))
            .unwrap_err();
        assert!(matches!(err, TradingError::InsufficientInventory { .. }));
        assert_eq!(err.kind(), ErrorKind::State);

        assert_eq!(state.inventory.list(EMAIL).unwrap(), before);
    }

    #[test]
    fn test_quantity_overflow_is_rejected_and_inventory_unchanged() {
        let (state, _) = setup();
        state
            .inventory
            .update(&inventory_request(Side::Buy, 1, 3_000_000_000, 100.0))
            .unwrap();
        let before = state.inventory.list(EMAIL).unwrap();

        let err = state
            .inventory
            .update(&inventory_request(Side::Buy, 1, 3_000_000_000, 100.0))
            .unwrap_err();
        assert!(matches!(err, TradingError::InvalidField { field: "quantity", .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(state.inventory.list(EMAIL).unwrap(), before);
    }

    #[test]
    fn test_selling_everything_removes_holding() {
        let (state, _) = setup();
        state
            .inventory
            .update(&inventory_request(Side::Buy, 1, 50, 100.0))
            .unwrap();
        let items = state
            .inventory
            .update(&inventory_request(Side::Sell, 1, 50, 105.0))
            .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_unknown_account_listing() {
        let (state, _) = setup();
        let err = state.inventory.list("nobody@example.com").unwrap_err();
        assert!(matches!(err, TradingError::AccountNotFound(_)));
    }
}

// =============================================================================
// Order Lifecycle Tests
// =============================================================================

mod order_tests {
    use super::*;

    #[test]
    fn test_market_buy_updates_inventory_exactly_once() {
        let (state, _) = setup();
        let order = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Market, 50, 100.0))
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);

        // A second execute is a no-op.
        let outcome = state.trading.execute_order(EMAIL, order.id()).unwrap();
        assert!(matches!(outcome, ExecutionOutcome::AlreadyProcessed(_)));

        let items = state.inventory.list(EMAIL).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].lots, 1);
        assert_eq!(items[0].quantity, 50);
    }

    #[test]
    fn test_limit_trigger_directions() {
        let (state, _) = setup();
        state
            .inventory
            .update(&inventory_request(Side::Buy, 5, 500, 90.0))
            .unwrap();

        let buy = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 100.0))
            .unwrap();
        let sell = state
            .trading
            .place_order(order_request(Side::Sell, OrderType::Limit, 10, 100.0))
            .unwrap();

        // Only the sell triggers above its limit.
        let filled = state.trading.check_limit_orders("NFO", "NIFTY", 100.5).unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].id(), sell.id());

        let filled = state.trading.check_limit_orders("NFO", "NIFTY", 100.0).unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].id(), buy.id());
        assert_eq!(filled[0].core().executed_price, Some(100.0));

        let filled = state.trading.check_limit_orders("NFO", "NIFTY", 99.0).unwrap();
        assert!(filled.is_empty());
    }

    #[test]
    fn test_sweep_then_manual_execute_single_fill() {
        let (state, _) = setup();
        let order = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 25, 100.0))
            .unwrap();

        let filled = state.trading.check_limit_orders("NFO", "NIFTY", 98.0).unwrap();
        assert_eq!(filled.len(), 1);

        let outcome = state.trading.execute_order(EMAIL, order.id()).unwrap();
        assert!(matches!(outcome, ExecutionOutcome::AlreadyProcessed(_)));
        assert_eq!(state.inventory.list(EMAIL).unwrap()[0].quantity, 25);
    }

    #[test]
    fn test_cancel_rules() {
        let (state, _) = setup();
        let market = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Market, 10, 100.0))
            .unwrap();
        let err = state.trading.cancel_order(EMAIL, market.id()).unwrap_err();
        assert!(matches!(err, TradingError::OrderNotCancelable(_)));

        let limit = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 95.0))
            .unwrap();
        let cancelled = state.trading.cancel_order(EMAIL, limit.id()).unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Rejected);

        let err = state.trading.cancel_order(EMAIL, limit.id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_trash_hides_order_until_restored() {
        let (state, _) = setup();
        let order = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Market, 10, 100.0))
            .unwrap();

        state.trading.trash_order(EMAIL, order.id()).unwrap();
        assert!(state.trading.orders(EMAIL).unwrap().find(order.id()).is_none());
        assert_eq!(state.trading.trash(EMAIL).unwrap().len(), 1);

        state.trading.restore_order(EMAIL, order.id()).unwrap();
        assert!(state.trading.orders(EMAIL).unwrap().find(order.id()).is_some());
        assert!(state.trading.trash(EMAIL).unwrap().is_empty());
    }

    #[test]
    fn test_purge_keeps_filled_and_market_orders() {
        let (state, _) = setup();
        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Market, 10, 100.0))
            .unwrap();
        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 90.0))
            .unwrap();
        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 95.0))
            .unwrap();

        assert_eq!(state.trading.purge_pending_limit_orders().unwrap(), 2);
        let orders = state.trading.orders(EMAIL).unwrap();
        assert_eq!(orders.total_orders().count(), 1);
    }
}

// =============================================================================
// Position Tests
// =============================================================================

mod position_tests {
    use super::*;

    #[test]
    fn test_long_and_short_pnl() {
        assert_eq!(position_pnl(Side::Buy, 5850.0, 5920.0, 100), 7000.0);
        assert_eq!(position_pnl(Side::Sell, 6450.0, 6380.0, 100), 7000.0);
    }

    #[test]
    fn test_close_short_at_stop() {
        let (state, _) = setup();
        state
            .inventory
            .update(&inventory_request(Side::Buy, 1, 100, 6400.0))
            .unwrap();
        let mut request = order_request(Side::Sell, OrderType::Market, 100, 6450.0);
        request.stop_loss = Some(6500.0);
        request.target = Some(6300.0);
        let order = state.trading.place_order(request).unwrap();

        let closed = state
            .trading
            .close_position(&ClosePositionRequest {
                order_id: order.id().to_string(),
                email: EMAIL.to_string(),
                exit_price: 6520.0,
                exit_type: None,
            })
            .unwrap();
        assert_eq!(closed.pnl, -7000.0);
        assert_eq!(closed.trade_status, TradeStatus::SlHit);

        let err = state
            .trading
            .close_position(&ClosePositionRequest {
                order_id: order.id().to_string(),
                email: EMAIL.to_string(),
                exit_price: 6400.0,
                exit_type: None,
            })
            .unwrap_err();
        assert!(matches!(err, TradingError::PositionAlreadyClosed(_)));
    }

    #[test]
    fn test_pending_order_cannot_close() {
        let (state, _) = setup();
        let order = state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 90.0))
            .unwrap();
        let err = state
            .trading
            .close_position(&ClosePositionRequest {
                order_id: order.id().to_string(),
                email: EMAIL.to_string(),
                exit_price: 95.0,
                exit_type: None,
            })
            .unwrap_err();
        assert!(matches!(err, TradingError::PositionNotFilled(_)));
    }
}

// =============================================================================
// Analytics Tests
// =============================================================================

mod analytics_tests {
    use super::*;

    #[test]
    fn test_fifo_partial_matching() {
        let (state, clock) = setup();
        for (side, quantity, price) in [
            (Side::Buy, 5, 100.0),
            (Side::Buy, 5, 110.0),
            (Side::Sell, 8, 120.0),
        ] {
            state
                .trading
                .place_order(order_request(side, OrderType::Market, quantity, price))
                .unwrap();
            clock.advance(chrono::Duration::minutes(1));
        }

        let reconstruction = state.analytics.reconstruction(EMAIL).unwrap();
        let legs: Vec<(u32, f64, f64)> = reconstruction
            .trades
            .iter()
            .map(|t| (t.quantity, t.entry_price, t.exit_price))
            .collect();
        assert_eq!(legs, vec![(5, 100.0, 120.0), (3, 110.0, 120.0)]);

        assert_eq!(reconstruction.open_lots.len(), 1);
        let lot = &reconstruction.open_lots[0];
        assert_eq!(lot.side, Side::Buy);
        assert_eq!(lot.quantity, 2);
        assert_eq!(lot.price, 110.0);
    }

    #[test]
    fn test_report_over_fifo_trades() {
        let (state, clock) = setup();
        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Market, 10, 100.0))
            .unwrap();
        clock.advance(chrono::Duration::minutes(10));
        state
            .trading
            .place_order(order_request(Side::Sell, OrderType::Market, 10, 110.0))
            .unwrap();

        let report = state.analytics.report(EMAIL, TradeSource::Fifo).unwrap();
        assert_eq!(report.summary.total_trades, 1);
        assert_eq!(report.summary.gross_pnl, 100.0);
        assert_eq!(report.summary.win_rate, 100.0);
        assert_eq!(report.by_weekday.len(), 7);
        assert_eq!(report.by_time_window.len(), 4);
    }

    #[test]
    fn test_drawdown_from_running_peak() {
        let trades: Vec<TradeRecord> = [(100.0, 200.0), (200.0, 50.0), (100.0, 150.0)]
            .iter()
            .enumerate()
            .map(|(i, (entry, exit))| TradeRecord {
                trade_id: Some(format!("t{}", i)),
                symbol: "NIFTY".to_string(),
                side: Side::Buy,
                quantity: 1,
                entry_price: *entry,
                exit_price: *exit,
                entry_time: START_MS + i as i64 * MINUTE,
                timestamp: START_MS + i as i64 * MINUTE + 1,
                brokerage: 0.0,
                charges: 0.0,
                stop_loss: None,
                target: None,
                outcome: Some(TradeStatus::Completed),
            })
            .collect();

        // +100, -150, +50
        assert_eq!(max_drawdown(&trades), 150.0);
    }

    #[test]
    fn test_reconstruct_ignores_unfilled_orders() {
        let (state, _) = setup();
        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 90.0))
            .unwrap();
        let orders = state.trading.orders(EMAIL).unwrap();
        let all: Vec<Order> = orders.total_orders().cloned().collect();

        let reconstruction = reconstruct(&all);
        assert!(reconstruction.trades.is_empty());
        assert!(reconstruction.open_lots.is_empty());
    }
}

// =============================================================================
// Review Tests
// =============================================================================

mod review_tests {
    use super::*;

    fn losing_trade_then_quick_reentry(state: &AppState, clock: &ManualClock) {
        let steps = [
            (Side::Buy, 100.0, 0),
            (Side::Sell, 90.0, 1),
            (Side::Buy, 95.0, 3),
            (Side::Sell, 96.0, 1),
        ];
        for (side, price, wait_minutes) in steps {
            clock.advance(chrono::Duration::minutes(wait_minutes));
            state
                .trading
                .place_order(order_request(side, OrderType::Market, 10, price))
                .unwrap();
        }
    }

    #[test]
    fn test_sync_detects_and_deduplicates() {
        let (state, clock) = setup();
        losing_trade_then_quick_reentry(&state, &clock);

        let first = state.mistakes.sync(EMAIL, None).unwrap();
        let types: Vec<MistakeType> = first.mistakes.iter().map(|m| m.mistake_type).collect();
        assert_eq!(types.iter().filter(|t| **t == MistakeType::NoStopLoss).count(), 2);
        assert_eq!(types.iter().filter(|t| **t == MistakeType::RapidReentry).count(), 1);
        assert_eq!(first.added, first.total);

        let second = state.mistakes.sync(EMAIL, None).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.total, first.total);
        assert_eq!(state.mistakes.log(EMAIL).unwrap().len(), first.total);
    }

    #[test]
    fn test_risk_locks_past_limit() {
        let (state, _) = setup();
        assert!(state.risk.update_settings(EMAIL, 1).is_err());

        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 90.0))
            .unwrap();
        state
            .trading
            .place_order(order_request(Side::Buy, OrderType::Limit, 10, 92.0))
            .unwrap();
        state.risk.update_settings(EMAIL, 1).unwrap();

        // No quote yet: nothing is evaluated.
        let report = state.risk.status(EMAIL).unwrap();
        assert_eq!(report.evaluated_orders, 0);
        assert_eq!(report.status, RiskStatus::Safe);

        state.prices.update(
            &PriceTick {
                symbol: "NIFTY".to_string(),
                market: "NFO".to_string(),
                price: 100.0,
                high: Some(101.0),
                low: Some(95.0),
                open: Some(96.0),
                close: None,
            },
            START_MS,
        );

        let report = state.risk.status(EMAIL).unwrap();
        assert_eq!(report.evaluated_orders, 2);
        assert_eq!(report.high_risk_count, 2);
        assert_eq!(report.status, RiskStatus::Locked);
    }
}
