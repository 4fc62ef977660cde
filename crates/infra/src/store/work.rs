//! Unit of work over a single locked item.
//!
//! A store hands the closure an [`ItemWork`] holding a snapshot of the locked
//! item. The closure stages a new level and transaction rows; nothing becomes
//! visible until the store turns the staged state into a [`WorkCommit`] and
//! persists it as one atomic step.

use chrono::{DateTime, Utc};

use stockroom_core::TransactionId;
use stockroom_inventory::{InventoryItem, NewStockTransaction, StockLevels, StockTransaction};

use crate::ledger::LedgerError;

use super::r#trait::StoreError;

/// Closure run by [`ItemStore::within_item`](super::ItemStore::within_item).
pub type ItemWorkFn = Box<dyn FnOnce(&mut ItemWork) -> Result<(), LedgerError> + Send>;

/// Staging area for one item's pending writes.
#[derive(Debug)]
pub struct ItemWork {
    item: InventoryItem,
    staged_levels: Option<StockLevels>,
    staged_rows: Vec<NewStockTransaction>,
}

/// What a successful unit of work persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkCommit {
    /// The item after the staged levels were applied.
    pub item: InventoryItem,
    /// Whether the counters changed (and need writing back).
    pub levels_changed: bool,
    /// Rows to append, in staging order.
    pub transactions: Vec<StockTransaction>,
}

impl ItemWork {
    pub fn new(item: InventoryItem) -> Self {
        Self {
            item,
            staged_levels: None,
            staged_rows: Vec::new(),
        }
    }

    /// The item as it was when the lock was taken.
    pub fn item(&self) -> &InventoryItem {
        &self.item
    }

    /// Current levels, including anything already staged.
    pub fn levels(&self) -> StockLevels {
        self.staged_levels.unwrap_or_else(|| self.item.levels())
    }

    pub fn set_levels(&mut self, levels: StockLevels) {
        self.staged_levels = Some(levels);
    }

    pub fn append(&mut self, row: NewStockTransaction) {
        self.staged_rows.push(row);
    }

    pub fn staged_rows(&self) -> &[NewStockTransaction] {
        &self.staged_rows
    }

    /// Turn the staged writes into what the store persists.
    ///
    /// Rejects rows that target another item and levels that would break the
    /// non-negative counter invariant; the store then writes nothing.
    pub fn into_commit(self, now: DateTime<Utc>) -> Result<WorkCommit, StoreError> {
        let item_id = self.item.id;
        if let Some(row) = self.staged_rows.iter().find(|r| r.item_id != item_id) {
            return Err(StoreError::Invalid(format!(
                "transaction row for item {} staged inside unit of work for item {item_id}",
                row.item_id
            )));
        }

        let mut item = self.item;
        let levels_changed = match self.staged_levels {
            Some(levels) if levels != item.levels() => {
                if !levels.is_valid() {
                    return Err(StoreError::Invalid(format!(
                        "negative counters (stock {}, issued {})",
                        levels.stock, levels.issued
                    )));
                }
                item.set_levels(levels, now);
                true
            }
            _ => false,
        };

        let transactions = self
            .staged_rows
            .into_iter()
            .map(|row| row.commit(TransactionId::new(), now))
            .collect();

        Ok(WorkCommit {
            item,
            levels_changed,
            transactions,
        })
    }
}
