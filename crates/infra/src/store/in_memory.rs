use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use stockroom_core::{Entity, ItemId, TransactionId, UserId};
use stockroom_inventory::{
    InventoryItem, ItemPatch, ItemStatus, NewItem, NewStockTransaction, StockLevels,
    StockOperation, StockTransaction,
};

use crate::audit::AuditEntry;
use crate::ledger::LedgerError;

use super::query::{ItemDetail, ItemPage, ItemQuery};
use super::r#trait::{ItemStore, StoreError};
use super::work::{ItemWork, ItemWorkFn};

type ItemCell = Arc<Mutex<InventoryItem>>;

/// In-memory item store.
///
/// Intended for tests/dev. Every item sits behind its own mutex, so units of
/// work on one item are serialised while other items proceed in parallel.
///
/// Lock order: `skus`, then `items`, then an item mutex, then `transactions`.
/// `within_item` releases the `items` guard before it takes the item mutex.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    skus: RwLock<HashMap<String, ItemId>>,
    items: RwLock<HashMap<ItemId, ItemCell>>,
    transactions: RwLock<HashMap<ItemId, Vec<StockTransaction>>>,
    audit: RwLock<Vec<AuditEntry>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters of an item.
    pub fn levels(&self, id: ItemId) -> Result<Option<StockLevels>, StoreError> {
        match self.cell(id)? {
            Some(cell) => Ok(Some(cell.lock().map_err(poisoned)?.levels())),
            None => Ok(None),
        }
    }

    fn cell(&self, id: ItemId) -> Result<Option<ItemCell>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.get(&id).cloned())
    }

    /// Snapshot of every item, each read under its own lock.
    fn snapshot(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        items
            .values()
            .map(|cell| cell.lock().map(|item| item.clone()).map_err(poisoned))
            .collect()
    }

    /// Newest-first rows for `id`. The caller must hold the item's mutex.
    fn recent_rows(&self, id: ItemId, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        let transactions = self.transactions.read().map_err(poisoned)?;
        Ok(transactions
            .get(&id)
            .map(|rows| rows.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    /// Distinct non-empty values of one optional text field, sorted.
    fn distinct<F>(&self, field: F) -> Result<Vec<String>, StoreError>
    where
        F: Fn(InventoryItem) -> Option<String>,
    {
        let values: BTreeSet<String> = self
            .snapshot()?
            .into_iter()
            .filter_map(field)
            .filter(|v| !v.is_empty())
            .collect();
        Ok(values.into_iter().collect())
    }

    fn update_each<F>(&self, ids: &[ItemId], mut f: F) -> Result<usize, StoreError>
    where
        F: FnMut(&mut InventoryItem),
    {
        let unique: BTreeSet<ItemId> = ids.iter().copied().collect();
        let items = self.items.read().map_err(poisoned)?;
        let mut found = 0;
        for id in unique {
            if let Some(cell) = items.get(&id) {
                let mut item = cell.lock().map_err(poisoned)?;
                f(&mut item);
                found += 1;
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn create_item(&self, new: NewItem, actor: UserId) -> Result<InventoryItem, StoreError> {
        let now = Utc::now();
        let item = InventoryItem::create(ItemId::new(), new, now);

        let mut skus = self.skus.write().map_err(poisoned)?;
        if skus.contains_key(&item.sku) {
            return Err(StoreError::Conflict(format!("sku '{}' already exists", item.sku)));
        }

        let mut rows = Vec::new();
        if item.stock() > 0 {
            let op = StockOperation::Receive { qty: item.stock() };
            rows.push(
                NewStockTransaction::for_operation(
                    item.id,
                    &op,
                    item.levels(),
                    Some("initial stock".to_string()),
                    actor,
                )
                .commit(TransactionId::new(), now),
            );
        }

        let id = item.id();
        let mut items = self.items.write().map_err(poisoned)?;
        let mut transactions = self.transactions.write().map_err(poisoned)?;
        skus.insert(item.sku.clone(), id);
        items.insert(id, Arc::new(Mutex::new(item.clone())));
        transactions.insert(id, rows);

        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        match self.cell(id)? {
            Some(cell) => Ok(Some(cell.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, StoreError> {
        let query = query.clone().normalized();
        let mut rows: Vec<InventoryItem> = self
            .snapshot()?
            .into_iter()
            .filter(|item| query.matches(item))
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));

        let total = rows.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let rows = rows
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .collect();

        Ok(ItemPage {
            total,
            page: query.page,
            limit: query.limit,
            rows,
        })
    }

    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<InventoryItem, StoreError> {
        let mut skus = self.skus.write().map_err(poisoned)?;
        let cell = self.cell(id)?.ok_or(StoreError::NotFound)?;
        let mut item = cell.lock().map_err(poisoned)?;

        if let Some(sku) = &patch.sku {
            if *sku != item.sku {
                if skus.contains_key(sku) {
                    return Err(StoreError::Conflict(format!("sku '{sku}' already exists")));
                }
                skus.remove(&item.sku);
                skus.insert(sku.clone(), id);
            }
        }

        patch.apply_to(&mut item, Utc::now());
        Ok(item.clone())
    }

    async fn set_status(&self, ids: &[ItemId], status: ItemStatus) -> Result<usize, StoreError> {
        let now = Utc::now();
        self.update_each(ids, |item| {
            item.status = status;
            item.updated_at = now;
        })
    }

    async fn set_category(&self, ids: &[ItemId], category: Option<String>) -> Result<usize, StoreError> {
        let now = Utc::now();
        self.update_each(ids, |item| {
            item.category = category.clone();
            item.updated_at = now;
        })
    }

    async fn set_supplier(&self, ids: &[ItemId], supplier: Option<String>) -> Result<usize, StoreError> {
        let now = Utc::now();
        self.update_each(ids, |item| {
            item.supplier = supplier.clone();
            item.updated_at = now;
        })
    }

    async fn transactions(&self, id: ItemId, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        let Some(cell) = self.cell(id)? else {
            return Ok(Vec::new());
        };
        let _item = cell.lock().map_err(poisoned)?;
        self.recent_rows(id, limit)
    }

    async fn item_detail(&self, id: ItemId, limit: usize) -> Result<Option<ItemDetail>, StoreError> {
        let Some(cell) = self.cell(id)? else {
            return Ok(None);
        };
        // One guard for both reads: within_item publishes rows and counters
        // under this same mutex.
        let item = cell.lock().map_err(poisoned)?;
        let transactions = self.recent_rows(id, limit)?;
        Ok(Some(ItemDetail {
            item: item.clone(),
            transactions,
        }))
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        self.distinct(|item| item.category)
    }

    async fn suppliers(&self) -> Result<Vec<String>, StoreError> {
        self.distinct(|item| item.supplier)
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.audit.write().map_err(poisoned)?.push(entry);
        Ok(())
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let audit = self.audit.read().map_err(poisoned)?;
        Ok(audit.iter().rev().take(limit).cloned().collect())
    }

    async fn within_item(&self, id: ItemId, work: ItemWorkFn) -> Result<InventoryItem, LedgerError> {
        let cell = self.cell(id)?.ok_or(LedgerError::NotFound(id))?;
        let mut item = cell.lock().map_err(poisoned)?;

        let mut staged = ItemWork::new(item.clone());
        work(&mut staged)?;
        let commit = staged.into_commit(Utc::now())?;

        if !commit.transactions.is_empty() {
            let mut transactions = self.transactions.write().map_err(poisoned)?;
            transactions
                .entry(id)
                .or_default()
                .extend(commit.transactions);
        }
        if commit.levels_changed {
            *item = commit.item;
        }
        Ok(item.clone())
    }
}
