//! SQLite persistence layer.
//!
//! Stores every account-owned document:
//! - Orders (buy list, sell list and trash, insertion order preserved by `seq`)
//! - Inventory holdings
//! - Mistake log entries (deduplicated by a unique key per account)
//! - Risk settings
//!
//! Orders are kept as a JSON body plus the handful of columns the queries filter
//! on. Writes that must be atomic go through [`SqliteStore::transaction`].

use crate::types::{
    AccountOrders, InventoryItem, MistakeEntry, Order, OrderStatus, OrderType, RiskSettings, Side,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An order row together with its soft-delete flag.
#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub order: Order,
    pub trashed: bool,
}

/// SQLite store for account data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Multi-statement writes run in a transaction, so a poisoned lock is safe to reuse.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                email TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orders (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                email TEXT NOT NULL,
                side TEXT NOT NULL,
                symbol TEXT NOT NULL,
                market TEXT NOT NULL,
                order_type TEXT NOT NULL,
                status TEXT NOT NULL,
                closed INTEGER NOT NULL DEFAULT 0,
                trashed INTEGER NOT NULL DEFAULT 0,
                body_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_email ON orders(email, trashed);
            CREATE INDEX IF NOT EXISTS idx_orders_pending
                ON orders(status, order_type, market, symbol);

            CREATE TABLE IF NOT EXISTS inventory (
                email TEXT NOT NULL,
                symbol TEXT NOT NULL,
                exchange TEXT NOT NULL,
                market TEXT NOT NULL,
                token TEXT NOT NULL,
                lots INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                total_value REAL NOT NULL,
                avg_buy_price REAL NOT NULL,
                last_updated INTEGER NOT NULL,
                PRIMARY KEY (email, symbol, exchange)
            );

            CREATE TABLE IF NOT EXISTS mistakes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL,
                dedup_key TEXT NOT NULL,
                trade_id TEXT,
                mistake_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                impact REAL NOT NULL,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                detected_at INTEGER NOT NULL,
                UNIQUE (email, dedup_key)
            );

            CREATE TABLE IF NOT EXISTS risk_settings (
                email TEXT PRIMARY KEY,
                max_high_risk_trades INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    /// Run `f` against the connection without a transaction.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T, E>,
    {
        let conn = self.lock();
        f(&StoreTx { conn: &conn })
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let value = f(&StoreTx { conn: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// Statement-level access to the store, scoped to one lock acquisition.
pub struct StoreTx<'c> {
    conn: &'c Connection,
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn decode_orders(bodies: Vec<String>) -> Result<Vec<Order>, StoreError> {
    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

impl StoreTx<'_> {
    // ========== Account Methods ==========

    /// Create the account row if it does not exist yet.
    pub fn ensure_account(&self, email: &str, now: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO accounts (email, created_at) VALUES (?1, ?2)",
            params![email, now],
        )?;
        Ok(())
    }

    pub fn account_exists(&self, email: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM accounts WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ========== Order Methods ==========

    /// Append an order to its account's list.
    pub fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let core = order.core();
        let body = serde_json::to_string(order)?;
        self.conn.execute(
            "INSERT INTO orders (id, email, side, symbol, market, order_type, status, closed, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                core.id,
                core.email,
                side_str(order.side()),
                core.symbol,
                core.market,
                core.order_type.to_string(),
                core.status.to_string(),
                order.is_closed(),
                body,
            ],
        )?;
        Ok(())
    }

    /// Load an order of an account, trashed or not.
    pub fn get_order(&self, email: &str, order_id: &str) -> Result<Option<StoredOrder>, StoreError> {
        let row: Option<(String, bool)> = self
            .conn
            .query_row(
                "SELECT body_json, trashed FROM orders WHERE email = ?1 AND id = ?2",
                params![email, order_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((body, trashed)) => Ok(Some(StoredOrder {
                order: serde_json::from_str(&body)?,
                trashed,
            })),
            None => Ok(None),
        }
    }

    /// Write `order` only if its stored status is still `expected`.
    ///
    /// Returns `false` when another writer moved the order on first.
    pub fn update_order_if_status(
        &self,
        order: &Order,
        expected: OrderStatus,
    ) -> Result<bool, StoreError> {
        let body = serde_json::to_string(order)?;
        let changed = self.conn.execute(
            "UPDATE orders SET status = ?2, closed = ?3, body_json = ?4
             WHERE id = ?1 AND status = ?5",
            params![
                order.id(),
                order.status().to_string(),
                order.is_closed(),
                body,
                expected.to_string(),
            ],
        )?;
        Ok(changed == 1)
    }

    /// Write the close fields of `order` only if it has not been closed yet.
    pub fn update_order_if_open(&self, order: &Order) -> Result<bool, StoreError> {
        let body = serde_json::to_string(order)?;
        let changed = self.conn.execute(
            "UPDATE orders SET closed = ?2, body_json = ?3 WHERE id = ?1 AND closed = 0",
            params![order.id(), order.is_closed(), body],
        )?;
        Ok(changed == 1)
    }

    /// Active (non-trashed) orders of an account, split by list.
    pub fn account_orders(&self, email: &str) -> Result<AccountOrders, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT body_json FROM orders WHERE email = ?1 AND trashed = 0 ORDER BY seq",
        )?;
        let bodies = stmt
            .query_map(params![email], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut orders = AccountOrders::default();
        for order in decode_orders(bodies)? {
            match order.side() {
                Side::Buy => orders.buy_orders.push(order),
                Side::Sell => orders.sell_orders.push(order),
            }
        }
        Ok(orders)
    }

    /// Soft-deleted orders of an account.
    pub fn trashed_orders(&self, email: &str) -> Result<Vec<Order>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT body_json FROM orders WHERE email = ?1 AND trashed = 1 ORDER BY seq",
        )?;
        let bodies = stmt
            .query_map(params![email], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_orders(bodies)
    }

    /// Move an order into or out of the trash. Returns `false` if nothing changed.
    pub fn set_trashed(&self, email: &str, order_id: &str, trashed: bool) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE orders SET trashed = ?3 WHERE email = ?1 AND id = ?2 AND trashed = ?4",
            params![email, order_id, trashed, !trashed],
        )?;
        Ok(changed == 1)
    }

    /// Filled, non-trashed orders of an account in insertion order.
    pub fn filled_orders(&self, email: &str) -> Result<Vec<Order>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT body_json FROM orders
             WHERE email = ?1 AND trashed = 0 AND status IN ('completed', 'executed')
             ORDER BY seq",
        )?;
        let bodies = stmt
            .query_map(params![email], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_orders(bodies)
    }

    /// Pending limit orders on one instrument across all accounts.
    pub fn pending_limit_orders(&self, market: &str, symbol: &str) -> Result<Vec<Order>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT body_json FROM orders
             WHERE status = 'pending' AND order_type = ?1 AND market = ?2 AND symbol = ?3
               AND trashed = 0
             ORDER BY seq",
        )?;
        let bodies = stmt
            .query_map(
                params![OrderType::Limit.to_string(), market, symbol],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        decode_orders(bodies)
    }

    /// Distinct `(market, symbol)` pairs with at least one pending limit order.
    pub fn pending_limit_pairs(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT market, symbol FROM orders
             WHERE status = 'pending' AND order_type = ?1 AND trashed = 0
             ORDER BY market, symbol",
        )?;
        let pairs = stmt
            .query_map(params![OrderType::Limit.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Pending orders of an account.
    pub fn pending_orders(&self, email: &str) -> Result<Vec<Order>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT body_json FROM orders
             WHERE email = ?1 AND status = 'pending' AND trashed = 0
             ORDER BY seq",
        )?;
        let bodies = stmt
            .query_map(params![email], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_orders(bodies)
    }

    /// Delete every pending limit order across all accounts.
    pub fn delete_pending_limit_orders(&self) -> Result<usize, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM orders WHERE status = 'pending' AND order_type = ?1",
            params![OrderType::Limit.to_string()],
        )?;
        Ok(removed)
    }

    // ========== Inventory Methods ==========

    pub fn get_inventory_item(
        &self,
        email: &str,
        symbol: &str,
        exchange: &str,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let item = self
            .conn
            .query_row(
                "SELECT email, symbol, exchange, market, token, lots, quantity, total_value,
                        avg_buy_price, last_updated
                 FROM inventory WHERE email = ?1 AND symbol = ?2 AND exchange = ?3",
                params![email, symbol, exchange],
                map_inventory_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn upsert_inventory_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO inventory (email, symbol, exchange, market, token, lots, quantity,
                                    total_value, avg_buy_price, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(email, symbol, exchange) DO UPDATE SET
                market = excluded.market,
                token = excluded.token,
                lots = excluded.lots,
                quantity = excluded.quantity,
                total_value = excluded.total_value,
                avg_buy_price = excluded.avg_buy_price,
                last_updated = excluded.last_updated",
            params![
                item.email,
                item.symbol,
                item.exchange,
                item.market,
                item.token,
                item.lots,
                item.quantity,
                item.total_value,
                item.avg_buy_price,
                item.last_updated,
            ],
        )?;
        Ok(())
    }

    pub fn delete_inventory_item(
        &self,
        email: &str,
        symbol: &str,
        exchange: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM inventory WHERE email = ?1 AND symbol = ?2 AND exchange = ?3",
            params![email, symbol, exchange],
        )?;
        Ok(())
    }

    pub fn list_inventory(&self, email: &str) -> Result<Vec<InventoryItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT email, symbol, exchange, market, token, lots, quantity, total_value,
                    avg_buy_price, last_updated
             FROM inventory WHERE email = ?1 ORDER BY symbol, exchange",
        )?;
        let items = stmt
            .query_map(params![email], map_inventory_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ========== Mistake Log Methods ==========

    /// Insert a mistake unless an entry with the same dedup key exists.
    ///
    /// Returns `true` when the entry was new.
    pub fn insert_mistake(
        &self,
        email: &str,
        entry: &MistakeEntry,
        now: i64,
    ) -> Result<bool, StoreError> {
        let severity = serde_json::to_value(entry.severity)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO mistakes
                (email, dedup_key, trade_id, mistake_type, severity, impact, symbol, timestamp, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                email,
                entry.dedup_key(),
                entry.trade_id,
                entry.mistake_type.to_string(),
                severity.as_str().unwrap_or_default(),
                entry.impact,
                entry.symbol,
                entry.timestamp,
                now,
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn list_mistakes(&self, email: &str) -> Result<Vec<MistakeEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_id, mistake_type, severity, impact, symbol, timestamp
             FROM mistakes WHERE email = ?1 ORDER BY timestamp, id",
        )?;
        let rows = stmt
            .query_map(params![email], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (trade_id, mistake_type, severity, impact, symbol, timestamp) in rows {
            entries.push(MistakeEntry {
                trade_id,
                mistake_type: serde_json::from_value(serde_json::Value::String(mistake_type))?,
                severity: serde_json::from_value(serde_json::Value::String(severity))?,
                impact,
                symbol,
                timestamp,
            });
        }
        Ok(entries)
    }

    // ========== Risk Settings Methods ==========

    pub fn get_risk_settings(&self, email: &str) -> Result<Option<RiskSettings>, StoreError> {
        let settings = self
            .conn
            .query_row(
                "SELECT email, max_high_risk_trades, updated_at FROM risk_settings WHERE email = ?1",
                params![email],
                |row| {
                    Ok(RiskSettings {
                        email: row.get(0)?,
                        max_high_risk_trades: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }

    pub fn save_risk_settings(&self, settings: &RiskSettings) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO risk_settings (email, max_high_risk_trades, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET
                max_high_risk_trades = excluded.max_high_risk_trades,
                updated_at = excluded.updated_at",
            params![settings.email, settings.max_high_risk_trades, settings.updated_at],
        )?;
        Ok(())
    }
}

fn map_inventory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        email: row.get(0)?,
        symbol: row.get(1)?,
        exchange: row.get(2)?,
        market: row.get(3)?,
        token: row.get(4)?,
        lots: row.get(5)?,
        quantity: row.get(6)?,
        total_value: row.get(7)?,
        avg_buy_price: row.get(8)?,
        last_updated: row.get(9)?,
    })
}
