pub mod analytics;
pub mod inventory;
pub mod mistake;
pub mod order;
pub mod price;
pub mod risk;
pub mod trade;

pub use analytics::*;
pub use inventory::*;
pub use mistake::*;
pub use order::*;
pub use price::*;
pub use risk::*;
pub use trade::*;
