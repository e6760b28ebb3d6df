//! Trade Reconstructor
//!
//! Rebuilds round-trip trades from raw order legs. Orders remain the source of
//! truth; nothing here is persisted.

use std::collections::{BTreeMap, VecDeque};

use crate::types::{OpenLot, Order, Reconstruction, Side, TradeRecord, TradeStatus};

/// A filled leg waiting on a symbol's queue.
#[derive(Debug, Clone)]
struct Leg {
    order_id: String,
    side: Side,
    price: f64,
    remaining: u32,
    original: u32,
    brokerage: f64,
    charges: f64,
    timestamp: i64,
    stop_loss: Option<f64>,
    target: Option<f64>,
}

impl Leg {
    fn from_order(order: &Order) -> Self {
        let core = order.core();
        Self {
            order_id: core.id.clone(),
            side: order.side(),
            price: core.entry_price,
            remaining: core.quantity,
            original: core.quantity,
            brokerage: core.brokerage,
            charges: core.charges,
            timestamp: order.fill_time(),
            stop_loss: core.stop_loss,
            target: core.target,
        }
    }

    /// Share of this leg's costs attributable to `quantity` units.
    fn prorated(&self, quantity: u32) -> (f64, f64) {
        if self.original == 0 {
            return (0.0, 0.0);
        }
        let share = f64::from(quantity) / f64::from(self.original);
        (self.brokerage * share, self.charges * share)
    }
}

/// FIFO-match the filled legs among `orders`, per symbol.
///
/// Legs are taken in fill-time order; ties keep the input order, which callers
/// supply as insertion order. An incoming leg on the opposite side of a queue's
/// head closes against it; anything left over opens a new position on the
/// incoming side.
pub fn reconstruct(orders: &[Order]) -> Reconstruction {
    let mut legs: Vec<&Order> = orders.iter().filter(|order| order.is_filled()).collect();
    legs.sort_by_key(|order| order.fill_time());

    let mut queues: BTreeMap<String, VecDeque<Leg>> = BTreeMap::new();
    let mut trades = Vec::new();

    for order in legs {
        let symbol = &order.core().symbol;
        let queue = queues.entry(symbol.clone()).or_default();
        let mut incoming = Leg::from_order(order);

        while incoming.remaining > 0 {
            let closes_head = queue
                .front()
                .is_some_and(|head| head.side != incoming.side);
            if !closes_head {
                break;
            }
            let Some(head) = queue.front_mut() else {
                break;
            };

            let quantity = head.remaining.min(incoming.remaining);
            let (entry_brokerage, entry_charges) = head.prorated(quantity);
            let (exit_brokerage, exit_charges) = incoming.prorated(quantity);

            trades.push(TradeRecord {
                trade_id: Some(format!("{}:{}", head.order_id, incoming.order_id)),
                symbol: symbol.clone(),
                side: head.side,
                quantity,
                entry_price: head.price,
                exit_price: incoming.price,
                entry_time: head.timestamp,
                timestamp: incoming.timestamp,
                brokerage: entry_brokerage + exit_brokerage,
                charges: entry_charges + exit_charges,
                stop_loss: head.stop_loss,
                target: head.target,
                outcome: Some(TradeStatus::Completed),
            });

            head.remaining -= quantity;
            incoming.remaining -= quantity;
            if head.remaining == 0 {
                queue.pop_front();
            }
        }

        if incoming.remaining > 0 {
            queue.push_back(incoming);
        }
    }

    let open_lots = queues
        .into_iter()
        .flat_map(|(symbol, queue)| {
            queue.into_iter().map(move |leg| OpenLot {
                order_id: leg.order_id,
                symbol: symbol.clone(),
                side: leg.side,
                quantity: leg.remaining,
                price: leg.price,
                timestamp: leg.timestamp,
            })
        })
        .collect();

    Reconstruction { trades, open_lots }
}

/// Trades recorded through the position closer, oldest exit first.
pub fn closed_trades(orders: &[Order]) -> Vec<TradeRecord> {
    let mut trades: Vec<TradeRecord> = orders
        .iter()
        .filter(|order| order.is_filled())
        .filter_map(TradeRecord::from_closed_order)
        .collect();
    trades.sort_by_key(|trade| trade.timestamp);
    trades
}
