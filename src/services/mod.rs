pub mod analytics;
pub mod cache;
pub mod cleanup;
pub mod clock;
pub mod inventory;
pub mod limit_monitor;
pub mod mistakes;
pub mod price_cache;
pub mod reconstructor;
pub mod risk;
pub mod sqlite_store;
pub mod trading;

pub use analytics::AnalyticsEngine;
pub use cache::Cache;
pub use cleanup::DailyCleanup;
pub use clock::{Clock, ManualClock, SystemClock};
pub use inventory::InventoryLedger;
pub use limit_monitor::LimitOrderMonitor;
pub use mistakes::{MistakeDetector, MistakeSync};
pub use price_cache::PriceCache;
pub use risk::RiskMonitor;
pub use sqlite_store::{SqliteStore, StoreError, StoreTx, StoredOrder};
pub use trading::{ErrorKind, ExecutionOutcome, TradingError, TradingService};
