//! Inventory domain module.
//!
//! Business rules for inventory items and the stock ledger, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod stock;
pub mod transaction;

pub use item::{DEFAULT_UNIT, InventoryItem, ItemPatch, ItemStatus, NewItem, UNITS};
pub use stock::{StockError, StockLevels, StockOperation};
pub use transaction::{NewStockTransaction, StockTransaction, TransactionType, replay};
