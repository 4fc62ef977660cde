//! Item storage boundary.
//!
//! `ItemStore` is the only way to read or write inventory items, their stock
//! transactions and the catalogue audit trail. Stock counters change only
//! inside [`ItemStore::within_item`], the unit of work that commits the new
//! counters and their transaction rows together or not at all.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;
pub mod work;

pub use in_memory::InMemoryItemStore;
pub use postgres::PostgresItemStore;
pub use query::{ItemDetail, ItemPage, ItemQuery, SortDir, SortField};
pub use r#trait::{ItemStore, StoreError};
pub use work::{ItemWork, ItemWorkFn, WorkCommit};
