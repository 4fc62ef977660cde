//! Stock ledger engine.
//!
//! Every stock movement flows through [`StockLedger::apply`]:
//!
//! ```text
//! operation
//!   ↓
//! 1. Validate the quantity (no storage access on rejection)
//!   ↓
//! 2. Lock the item inside ItemStore::within_item
//!   ↓
//! 3. Compute the new levels from the locked state
//!   ↓
//! 4. Stage the new levels and one transaction row
//!   ↓
//! 5. Commit both together, or nothing
//! ```
//!
//! The engine holds no state of its own; correctness under concurrency comes
//! from the store's per-item serialisation.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use stockroom_core::{ItemId, UserId};
use stockroom_inventory::{
    InventoryItem, NewStockTransaction, StockError, StockOperation, TransactionType,
};

use crate::store::{ItemStore, ItemWork, StoreError};

/// Why a stock operation did not take effect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("return exceeds issued count: requested {requested}, issued {issued}")]
    ReturnExceedsIssued { requested: i64, issued: i64 },

    #[error("resulting stock would be negative: stock {stock}, delta {delta}")]
    NegativeResultingStock { stock: i64, delta: i64 },

    /// Lock wait timed out or the store could not be reached. Safe to retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Non-retryable storage failure.
    #[error(transparent)]
    Store(StoreError),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageUnavailable(_))
    }

    /// Business rejections, as opposed to storage failures.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            LedgerError::StorageUnavailable(_) | LedgerError::Store(_)
        )
    }
}

impl From<StockError> for LedgerError {
    fn from(value: StockError) -> Self {
        match value {
            StockError::InvalidQuantity(msg) => LedgerError::InvalidQuantity(msg),
            StockError::InsufficientStock {
                requested,
                available,
            } => LedgerError::InsufficientStock {
                requested,
                available,
            },
            StockError::ReturnExceedsIssued { requested, issued } => {
                LedgerError::ReturnExceedsIssued { requested, issued }
            }
            StockError::NegativeResultingStock { stock, delta } => {
                LedgerError::NegativeResultingStock { stock, delta }
            }
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(msg) => LedgerError::StorageUnavailable(msg),
            other => LedgerError::Store(other),
        }
    }
}

/// Applies stock operations to items held in an [`ItemStore`].
#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
}

impl<S> StockLedger<S>
where
    S: ItemStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply one operation atomically and return the item as committed.
    ///
    /// On success exactly one transaction row is appended; on any error no
    /// row is appended and the counters are unchanged.
    #[instrument(
        name = "stock_ledger.apply",
        skip(self, note),
        fields(item_id = %item_id, op = %op.kind(), qty = op.quantity(), actor = %actor)
    )]
    pub async fn apply(
        &self,
        item_id: ItemId,
        op: StockOperation,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        if let Err(err) = op.validate() {
            debug!(error = %err, "stock operation rejected before locking");
            return Err(err.into());
        }

        let result = self
            .store
            .within_item(
                item_id,
                Box::new(move |work: &mut ItemWork| {
                    let after = work.levels().apply(&op)?;
                    work.set_levels(after);
                    work.append(NewStockTransaction::for_operation(
                        item_id, &op, after, note, actor,
                    ));
                    Ok(())
                }),
            )
            .await;

        match &result {
            Ok(item) => info!(stock = item.stock(), issued = item.issued(), "stock operation applied"),
            Err(err) if err.is_rejection() => debug!(error = %err, "stock operation rejected"),
            Err(err) => warn!(error = %err, retryable = err.is_retryable(), "stock operation failed"),
        }
        result
    }

    /// Apply a typed operation from its transaction type and quantity.
    pub async fn apply_kind(
        &self,
        item_id: ItemId,
        kind: TransactionType,
        qty: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        self.apply(item_id, StockOperation::new(kind, qty), note, actor)
            .await
    }

    /// Move `qty` units from the shelf to checked-out.
    pub async fn issue(
        &self,
        item_id: ItemId,
        qty: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        self.apply(item_id, StockOperation::Issue { qty }, note, actor)
            .await
    }

    /// Add `qty` newly acquired units to the shelf.
    pub async fn receive(
        &self,
        item_id: ItemId,
        qty: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        self.apply(item_id, StockOperation::Receive { qty }, note, actor)
            .await
    }

    /// Correct the shelf count by a signed `delta`.
    pub async fn adjust(
        &self,
        item_id: ItemId,
        delta: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        self.apply(item_id, StockOperation::Adjust { delta }, note, actor)
            .await
    }

    /// Move `qty` previously issued units back to the shelf.
    pub async fn return_stock(
        &self,
        item_id: ItemId,
        qty: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        self.apply(item_id, StockOperation::Return { qty }, note, actor)
            .await
    }

    /// Permanently remove `qty` units from the shelf.
    pub async fn dispose(
        &self,
        item_id: ItemId,
        qty: i64,
        note: Option<String>,
        actor: UserId,
    ) -> Result<InventoryItem, LedgerError> {
        self.apply(item_id, StockOperation::Dispose { qty }, note, actor)
            .await
    }
}
