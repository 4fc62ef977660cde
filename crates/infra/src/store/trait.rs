use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{ItemId, UserId};
use stockroom_inventory::{InventoryItem, ItemPatch, ItemStatus, NewItem, StockTransaction};

use crate::audit::AuditEntry;
use crate::ledger::LedgerError;

use super::query::{ItemDetail, ItemPage, ItemQuery};
use super::work::ItemWorkFn;

/// Storage operation error.
///
/// These are infrastructure failures, as opposed to the ledger's business
/// rejections. Only `Unavailable` is worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint was hit (duplicate SKU).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Lock wait timeout, connectivity loss, pool exhaustion.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write would break a storage-level invariant.
    #[error("invalid write: {0}")]
    Invalid(String),

    /// A persisted row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Durable store for inventory items, their stock transactions and the audit trail.
///
/// ## Implementation requirements
///
/// - SKUs are unique; `create_item` and `update_item` report duplicates as
///   `StoreError::Conflict`.
/// - `within_item` serialises calls for the same item and never blocks calls
///   for other items. The staged level change and staged transaction rows are
///   committed together when the closure returns `Ok`, and nothing is written
///   when it returns `Err`.
/// - A reader never observes a transaction row without the state change that
///   produced it, or the reverse.
/// - Transaction rows are never updated or deleted.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a validated item. A positive seed stock is recorded as an
    /// initial RECEIVE row in the same atomic step.
    async fn create_item(&self, new: NewItem, actor: UserId) -> Result<InventoryItem, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError>;

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, StoreError>;

    /// Apply a validated catalogue patch. Never touches stock counters.
    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<InventoryItem, StoreError>;

    /// Set the status of every listed item that exists; returns how many were found.
    async fn set_status(&self, ids: &[ItemId], status: ItemStatus) -> Result<usize, StoreError>;

    /// Set (or clear) the category of every listed item that exists.
    async fn set_category(&self, ids: &[ItemId], category: Option<String>) -> Result<usize, StoreError>;

    /// Set (or clear) the supplier of every listed item that exists.
    async fn set_supplier(&self, ids: &[ItemId], supplier: Option<String>) -> Result<usize, StoreError>;

    /// Newest-first transaction rows for one item.
    async fn transactions(&self, id: ItemId, limit: usize) -> Result<Vec<StockTransaction>, StoreError>;

    /// The item and its `limit` newest rows from one consistent snapshot.
    /// No unit of work on the item may commit between the two reads.
    async fn item_detail(&self, id: ItemId, limit: usize) -> Result<Option<ItemDetail>, StoreError>;

    /// Distinct non-empty categories, sorted.
    async fn categories(&self) -> Result<Vec<String>, StoreError>;

    /// Distinct non-empty suppliers, sorted.
    async fn suppliers(&self) -> Result<Vec<String>, StoreError>;

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Newest-first audit entries.
    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;

    /// Run `work` against the locked item and commit what it staged.
    ///
    /// Returns the item as committed. Fails with `LedgerError::NotFound` when
    /// the item does not exist, with the closure's own error when it rejects,
    /// and with `LedgerError::StorageUnavailable` when the lock or connection
    /// cannot be obtained.
    async fn within_item(&self, id: ItemId, work: ItemWorkFn) -> Result<InventoryItem, LedgerError>;
}

#[async_trait]
impl<S> ItemStore for Arc<S>
where
    S: ItemStore + ?Sized,
{
    async fn create_item(&self, new: NewItem, actor: UserId) -> Result<InventoryItem, StoreError> {
        (**self).create_item(new, actor).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        (**self).get_item(id).await
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, StoreError> {
        (**self).list_items(query).await
    }

    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<InventoryItem, StoreError> {
        (**self).update_item(id, patch).await
    }

    async fn set_status(&self, ids: &[ItemId], status: ItemStatus) -> Result<usize, StoreError> {
        (**self).set_status(ids, status).await
    }

    async fn set_category(&self, ids: &[ItemId], category: Option<String>) -> Result<usize, StoreError> {
        (**self).set_category(ids, category).await
    }

    async fn set_supplier(&self, ids: &[ItemId], supplier: Option<String>) -> Result<usize, StoreError> {
        (**self).set_supplier(ids, supplier).await
    }

    async fn transactions(&self, id: ItemId, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).transactions(id, limit).await
    }

    async fn item_detail(&self, id: ItemId, limit: usize) -> Result<Option<ItemDetail>, StoreError> {
        (**self).item_detail(id, limit).await
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        (**self).categories().await
    }

    async fn suppliers(&self) -> Result<Vec<String>, StoreError> {
        (**self).suppliers().await
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        (**self).record_audit(entry).await
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).audit_log(limit).await
    }

    async fn within_item(&self, id: ItemId, work: ItemWorkFn) -> Result<InventoryItem, LedgerError> {
        (**self).within_item(id, work).await
    }
}
