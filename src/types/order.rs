//! Order Types
//!
//! Orders for futures paper trading. Each account files orders under a buy-side
//! list and a sell-side list; the `Order` variant *is* that list, so an order can
//! never change sides after placement.

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The other side of the book.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Sign applied to a price move when computing P&L.
    pub fn direction(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    /// Name of the per-account list orders of this side are filed under.
    pub fn list_name(self) -> &'static str {
        match self {
            Side::Buy => "buyOrders",
            Side::Sell => "sellOrders",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Filled immediately at the submitted price
    Market,
    /// Filled by the limit monitor once the market crosses the price
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

/// Order status. Moves forward only: `pending` to a filled state or `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for a fill (limit orders)
    Pending,
    /// Filled
    Completed,
    /// Cancelled by the user
    Rejected,
    /// Filled (legacy spelling kept for stored records)
    Executed,
}

impl OrderStatus {
    /// Whether the order has been filled.
    pub fn is_filled(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Executed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Rejected => write!(f, "rejected"),
            OrderStatus::Executed => write!(f, "executed"),
        }
    }
}

/// Lifecycle of the position opened by an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Pending,
    Open,
    Completed,
    TargetHit,
    SlHit,
}

impl TradeStatus {
    /// Whether this status records a realized outcome.
    pub fn is_outcome(self) -> bool {
        matches!(
            self,
            TradeStatus::Completed | TradeStatus::TargetHit | TradeStatus::SlHit
        )
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "PENDING"),
            TradeStatus::Open => write!(f, "OPEN"),
            TradeStatus::Completed => write!(f, "COMPLETED"),
            TradeStatus::TargetHit => write!(f, "TARGET_HIT"),
            TradeStatus::SlHit => write!(f, "SL_HIT"),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// Market snapshot captured when the order was placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub ltp: Option<f64>,
}

/// Fields shared by buy and sell orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCore {
    /// Unique order ID
    pub id: String,
    /// Owning account
    pub email: String,
    /// Instrument symbol (e.g., "NIFTY24JANFUT")
    pub symbol: String,
    /// Market segment the price feed reports under
    pub market: String,
    /// Exchange the contract trades on
    pub exchange: String,
    /// Broker instrument token
    pub token: String,
    /// Number of lots
    pub lot: u32,
    /// Order price (limit price for limit orders)
    pub price: f64,
    /// Contract quantity (lots times lot size)
    pub quantity: u32,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Placement time (ms)
    pub timestamp: i64,
    /// Fill price; equals `price` once filled
    pub entry_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    /// Flat brokerage per order
    pub brokerage: f64,
    /// Exchange/statutory charges accumulated across entry and exit
    pub charges: f64,
    pub trade_status: TradeStatus,
    /// Fill time (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<i64>,
    /// Market price observed by the limit sweep at fill time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<f64>,
    /// Close time (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PriceSnapshot>,
}

/// A trading order, tagged by the list it is filed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum Order {
    Buy(OrderCore),
    Sell(OrderCore),
}

impl Order {
    /// Wrap a core record in the variant for `side`.
    pub fn new(side: Side, core: OrderCore) -> Self {
        match side {
            Side::Buy => Order::Buy(core),
            Side::Sell => Order::Sell(core),
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Order::Buy(_) => Side::Buy,
            Order::Sell(_) => Side::Sell,
        }
    }

    pub fn core(&self) -> &OrderCore {
        match self {
            Order::Buy(core) | Order::Sell(core) => core,
        }
    }

    pub fn core_mut(&mut self) -> &mut OrderCore {
        match self {
            Order::Buy(core) | Order::Sell(core) => core,
        }
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn status(&self) -> OrderStatus {
        self.core().status
    }

    pub fn is_pending(&self) -> bool {
        self.core().status == OrderStatus::Pending
    }

    pub fn is_filled(&self) -> bool {
        self.core().status.is_filled()
    }

    /// Whether the close fields have been written.
    pub fn is_closed(&self) -> bool {
        let core = self.core();
        core.exit_price.is_some() || core.closed_at.is_some()
    }

    /// Time the order was filled, falling back to placement time.
    pub fn fill_time(&self) -> i64 {
        let core = self.core();
        core.executed_at.unwrap_or(core.timestamp)
    }

    /// Mark the order filled at its own price.
    pub fn fill(&mut self, executed_at: i64, executed_price: Option<f64>) {
        let core = self.core_mut();
        core.status = OrderStatus::Completed;
        core.executed_at = Some(executed_at);
        core.executed_price = executed_price;
        core.entry_price = core.price;
        core.trade_status = TradeStatus::Open;
    }

    /// Cancel a pending order.
    pub fn cancel(&mut self) {
        self.core_mut().status = OrderStatus::Rejected;
    }

    /// Realized P&L once closed.
    pub fn realized_pnl(&self) -> Option<f64> {
        let core = self.core();
        core.exit_price
            .map(|exit| position_pnl(self.side(), core.entry_price, exit, core.quantity))
    }

    /// Whether the limit order should fill at `current_price`.
    pub fn limit_triggered(&self, current_price: f64) -> bool {
        let core = self.core();
        if core.order_type != OrderType::Limit {
            return false;
        }
        match self.side() {
            Side::Buy => current_price <= core.price,
            Side::Sell => current_price >= core.price,
        }
    }

    /// Exchange key used by the inventory ledger (exchange, else market).
    pub fn inventory_exchange(&self) -> &str {
        let core = self.core();
        if core.exchange.is_empty() {
            &core.market
        } else {
            &core.exchange
        }
    }
}

/// P&L of a position of `quantity` opened at `entry` and closed at `exit`.
pub fn position_pnl(side: Side, entry: f64, exit: f64, quantity: u32) -> f64 {
    (exit - entry) * f64::from(quantity) * side.direction()
}

/// Charges on a notional value, rounded to whole currency units.
pub fn charges_for(notional: f64, rate: f64) -> f64 {
    (notional * rate).round()
}

/// Classify how a position was closed.
///
/// Target wins over stop loss: `TARGET_HIT` if asked for or the exit reached the
/// target, then `SL_HIT` if asked for or the exit reached the stop loss.
pub fn classify_exit(
    side: Side,
    exit_price: f64,
    stop_loss: Option<f64>,
    target: Option<f64>,
    exit_type: Option<&str>,
) -> TradeStatus {
    let target_reached = target.is_some_and(|t| match side {
        Side::Buy => exit_price >= t,
        Side::Sell => exit_price <= t,
    });
    if exit_type == Some("TARGET_HIT") || target_reached {
        return TradeStatus::TargetHit;
    }

    let stop_reached = stop_loss.is_some_and(|sl| match side {
        Side::Buy => exit_price <= sl,
        Side::Sell => exit_price >= sl,
    });
    if exit_type == Some("SL_HIT") || stop_reached {
        return TradeStatus::SlHit;
    }

    TradeStatus::Completed
}

// =============================================================================
// Account Views
// =============================================================================

/// An account's active orders, split by list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOrders {
    pub buy_orders: Vec<Order>,
    pub sell_orders: Vec<Order>,
}

impl AccountOrders {
    /// Buy list followed by sell list, each in insertion order.
    pub fn total_orders(&self) -> impl Iterator<Item = &Order> {
        self.buy_orders.iter().chain(self.sell_orders.iter())
    }

    /// Filled orders whose position has not been closed yet.
    pub fn total_positions(&self) -> impl Iterator<Item = &Order> {
        self.total_orders()
            .filter(|order| order.is_filled() && !order.is_closed())
    }

    /// Find an order in either list.
    pub fn find(&self, order_id: &str) -> Option<&Order> {
        self.total_orders().find(|order| order.id() == order_id)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request to place a new order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub direction: Option<Side>,
    #[serde(default)]
    pub execution_type: Option<OrderType>,
    #[serde(default)]
    pub lot: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub token: String,
    pub stop_loss: Option<f64>,
    pub target: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub ltp: Option<f64>,
}

impl PlaceOrderRequest {
    /// The optional market snapshot, if any part of it was sent.
    pub fn snapshot(&self) -> Option<PriceSnapshot> {
        let snapshot = PriceSnapshot {
            high: self.high,
            low: self.low,
            open: self.open,
            close: self.close,
            ltp: self.ltp,
        };
        (snapshot != PriceSnapshot::default()).then_some(snapshot)
    }
}

/// Request naming one order of one account (execute, cancel).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionRequest {
    pub order_id: String,
    pub email: String,
}

/// Request to close the position opened by a filled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub order_id: String,
    pub email: String,
    pub exit_price: f64,
    #[serde(default)]
    pub exit_type: Option<String>,
}

/// Result of closing a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    pub order: Order,
    pub pnl: f64,
    pub trade_status: TradeStatus,
    pub exit_price: f64,
    pub brokerage: f64,
    pub charges: f64,
}

/// Request to sweep pending limit orders against a price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLimitOrdersRequest {
    pub symbol: String,
    pub market: String,
    pub current_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(price: f64, quantity: u32) -> OrderCore {
        OrderCore {
            id: "order-1".to_string(),
            email: "trader@example.com".to_string(),
            symbol: "NIFTY".to_string(),
            market: "NFO".to_string(),
            exchange: "NSE".to_string(),
            token: "35001".to_string(),
            lot: 1,
            price,
            quantity,
            order_type: OrderType::Limit,
            status: OrderStatus::Pending,
            timestamp: 1_000,
            entry_price: price,
            exit_price: None,
            stop_loss: None,
            target: None,
            brokerage: 20.0,
            charges: 0.0,
            trade_status: TradeStatus::Pending,
            executed_at: None,
            executed_price: None,
            closed_at: None,
            snapshot: None,
        }
    }

    #[test]
    fn test_order_serializes_side_tag() {
        let order = Order::Sell(core(100.0, 50));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["side"], "sell");
        assert_eq!(json["orderType"], "limit");
        assert_eq!(json["tradeStatus"], "PENDING");

        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back.side(), Side::Sell);
        assert_eq!(back.id(), "order-1");
    }

    #[test]
    fn test_limit_trigger_direction() {
        let buy = Order::Buy(core(100.0, 1));
        assert!(buy.limit_triggered(100.0));
        assert!(buy.limit_triggered(99.5));
        assert!(!buy.limit_triggered(100.5));

        let sell = Order::Sell(core(100.0, 1));
        assert!(sell.limit_triggered(100.0));
        assert!(sell.limit_triggered(100.5));
        assert!(!sell.limit_triggered(99.5));
    }

    #[test]
    fn test_market_orders_never_limit_trigger() {
        let mut c = core(100.0, 1);
        c.order_type = OrderType::Market;
        assert!(!Order::Buy(c).limit_triggered(50.0));
    }

    #[test]
    fn test_fill_sets_entry_fields() {
        let mut order = Order::Buy(core(101.5, 10));
        order.fill(5_000, Some(101.0));

        let c = order.core();
        assert_eq!(c.status, OrderStatus::Completed);
        assert_eq!(c.executed_at, Some(5_000));
        assert_eq!(c.executed_price, Some(101.0));
        assert_eq!(c.entry_price, 101.5);
        assert_eq!(c.trade_status, TradeStatus::Open);
        assert!(order.is_filled());
    }

    #[test]
    fn test_position_pnl_examples() {
        assert_eq!(position_pnl(Side::Buy, 5850.0, 5920.0, 100), 7000.0);
        assert_eq!(position_pnl(Side::Sell, 6450.0, 6380.0, 100), 7000.0);
        assert_eq!(position_pnl(Side::Buy, 100.0, 90.0, 5), -50.0);
    }

    #[test]
    fn test_charges_rounding() {
        assert_eq!(charges_for(590_000.0, 0.0001), 59.0);
        assert_eq!(charges_for(1_000.0, 0.0001), 0.0);
        assert_eq!(charges_for(26_000.0, 0.0001), 3.0);
    }

    #[test]
    fn test_classify_exit() {
        let sl = Some(95.0);
        let tgt = Some(110.0);
        assert_eq!(classify_exit(Side::Buy, 111.0, sl, tgt, None), TradeStatus::TargetHit);
        assert_eq!(classify_exit(Side::Buy, 94.0, sl, tgt, None), TradeStatus::SlHit);
        assert_eq!(classify_exit(Side::Buy, 100.0, sl, tgt, None), TradeStatus::Completed);
        assert_eq!(
            classify_exit(Side::Buy, 100.0, sl, tgt, Some("TARGET_HIT")),
            TradeStatus::TargetHit
        );

        let sell_sl = Some(105.0);
        let sell_tgt = Some(90.0);
        assert_eq!(classify_exit(Side::Sell, 89.0, sell_sl, sell_tgt, None), TradeStatus::TargetHit);
        assert_eq!(classify_exit(Side::Sell, 106.0, sell_sl, sell_tgt, None), TradeStatus::SlHit);
        assert_eq!(classify_exit(Side::Sell, 100.0, None, None, Some("SL_HIT")), TradeStatus::SlHit);
        assert_eq!(classify_exit(Side::Sell, 100.0, None, None, Some("MANUAL")), TradeStatus::Completed);
    }

    #[test]
    fn test_reached_target_beats_requested_stop_loss() {
        assert_eq!(
            classify_exit(Side::Buy, 112.0, Some(95.0), Some(110.0), Some("SL_HIT")),
            TradeStatus::TargetHit
        );
        assert_eq!(
            classify_exit(Side::Sell, 88.0, Some(105.0), Some(90.0), Some("SL_HIT")),
            TradeStatus::TargetHit
        );
        assert_eq!(
            classify_exit(Side::Buy, 100.0, Some(95.0), Some(110.0), Some("SL_HIT")),
            TradeStatus::SlHit
        );
    }

    #[test]
    fn test_account_views() {
        let mut filled = Order::Buy(core(100.0, 1));
        filled.fill(10, None);
        let mut closed = Order::Sell(core(100.0, 1));
        closed.fill(20, None);
        closed.core_mut().id = "order-2".to_string();
        closed.core_mut().exit_price = Some(90.0);
        closed.core_mut().closed_at = Some(30);
        let mut pending = Order::Buy(core(99.0, 1));
        pending.core_mut().id = "order-3".to_string();

        let orders = AccountOrders {
            buy_orders: vec![filled, pending],
            sell_orders: vec![closed],
        };

        let ids: Vec<&str> = orders.total_orders().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["order-1", "order-3", "order-2"]);

        let positions: Vec<&str> = orders.total_positions().map(|o| o.id()).collect();
        assert_eq!(positions, vec!["order-1"]);
        assert!(orders.find("order-2").is_some());
    }

    #[test]
    fn test_snapshot_only_when_sent() {
        let mut request = PlaceOrderRequest::default();
        assert!(request.snapshot().is_none());
        request.ltp = Some(101.0);
        assert_eq!(request.snapshot().unwrap().ltp, Some(101.0));
    }
}
