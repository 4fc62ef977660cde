//! Infrastructure layer: item storage, the stock ledger engine, catalogue
//! orchestration and the audit trail.

pub mod audit;
pub mod catalog;
pub mod ledger;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use audit::{AuditAction, AuditEntry};
pub use catalog::{BulkAction, Catalog, CatalogError, CatalogMeta};
pub use ledger::{LedgerError, StockLedger};
pub use store::{
    InMemoryItemStore, ItemDetail, ItemPage, ItemQuery, ItemStore, ItemWork, ItemWorkFn,
    PostgresItemStore, SortDir, SortField, StoreError,
};
