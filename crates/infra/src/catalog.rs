//! Catalogue orchestration: validation, storage and the audit trail for
//! item create/update/archive and bulk actions.
//!
//! Audit writes are best-effort. A failed audit write is logged and the
//! catalogue change it describes still stands.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{instrument, warn};

use stockroom_core::{DomainError, ItemId, UserId};
use stockroom_inventory::{InventoryItem, ItemPatch, ItemStatus, NewItem, UNITS};

use crate::audit::{AuditAction, AuditEntry};
use crate::store::{ItemDetail, ItemPage, ItemQuery, ItemStore, StoreError};

/// Recent transactions returned alongside an item.
pub const DETAIL_TRANSACTION_LIMIT: usize = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("item not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl CatalogError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Store(e) if e.is_retryable())
    }
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => CatalogError::NotFound,
            StoreError::Conflict(msg) => CatalogError::Conflict(msg),
            other => CatalogError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    Archive,
    Unarchive,
    SetCategory(Option<String>),
    SetSupplier(Option<String>),
}

impl BulkAction {
    fn audit_action(&self) -> AuditAction {
        match self {
            BulkAction::Archive => AuditAction::BulkArchive,
            BulkAction::Unarchive => AuditAction::BulkUnarchive,
            BulkAction::SetCategory(_) => AuditAction::BulkSetCategory,
            BulkAction::SetSupplier(_) => AuditAction::BulkSetSupplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogMeta {
    pub statuses: Vec<ItemStatus>,
    pub categories: Vec<String>,
    pub suppliers: Vec<String>,
    pub units: Vec<String>,
}

/// Item catalogue service.
#[derive(Debug, Clone)]
pub struct Catalog<S> {
    store: S,
}

impl<S> Catalog<S>
where
    S: ItemStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, new), fields(sku = %new.sku, actor = %actor), err)]
    pub async fn create(&self, new: NewItem, actor: UserId) -> Result<InventoryItem, CatalogError> {
        let new = new.validate()?;
        let item = self.store.create_item(new, actor).await?;
        self.audit(AuditEntry::new(
            AuditAction::Create,
            Some(item.id),
            Some(actor),
            json!({ "sku": item.sku, "stock": item.stock() }),
        ))
        .await;
        Ok(item)
    }

    /// The item and its recent rows, read together so the newest row always
    /// matches the returned counters.
    pub async fn get(&self, id: ItemId) -> Result<ItemDetail, CatalogError> {
        self.store
            .item_detail(id, DETAIL_TRANSACTION_LIMIT)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    pub async fn list(&self, query: ItemQuery) -> Result<ItemPage, CatalogError> {
        Ok(self.store.list_items(&query.normalized()).await?)
    }

    #[instrument(skip(self, patch), fields(item_id = %id, actor = %actor), err)]
    pub async fn update(
        &self,
        id: ItemId,
        patch: ItemPatch,
        actor: UserId,
    ) -> Result<InventoryItem, CatalogError> {
        let patch = patch.validate()?;
        let item = self.store.update_item(id, &patch).await?;
        let changes = serde_json::to_value(&patch).unwrap_or_default();
        self.audit(AuditEntry::new(
            AuditAction::Update,
            Some(id),
            Some(actor),
            json!({ "changes": changes }),
        ))
        .await;
        Ok(item)
    }

    /// Soft-delete: items are never physically removed.
    #[instrument(skip(self), fields(item_id = %id, actor = %actor), err)]
    pub async fn archive(&self, id: ItemId, actor: UserId) -> Result<(), CatalogError> {
        let touched = self.store.set_status(&[id], ItemStatus::Archived).await?;
        if touched == 0 {
            return Err(CatalogError::NotFound);
        }
        self.audit(AuditEntry::new(
            AuditAction::Archive,
            Some(id),
            Some(actor),
            serde_json::Value::Null,
        ))
        .await;
        Ok(())
    }

    /// Apply `action` to every listed item that exists; returns how many were touched.
    #[instrument(skip(self, ids), fields(count = ids.len(), actor = %actor), err)]
    pub async fn bulk(
        &self,
        action: BulkAction,
        ids: &[ItemId],
        actor: UserId,
    ) -> Result<usize, CatalogError> {
        if ids.is_empty() {
            return Err(DomainError::validation("ids cannot be empty").into());
        }

        let touched = match &action {
            BulkAction::Archive => self.store.set_status(ids, ItemStatus::Archived).await?,
            BulkAction::Unarchive => self.store.set_status(ids, ItemStatus::Active).await?,
            BulkAction::SetCategory(category) => {
                self.store.set_category(ids, trimmed(category)).await?
            }
            BulkAction::SetSupplier(supplier) => {
                self.store.set_supplier(ids, trimmed(supplier)).await?
            }
        };

        let mut meta = json!({ "ids": ids, "touched": touched });
        match &action {
            BulkAction::SetCategory(category) => meta["category"] = json!(trimmed(category)),
            BulkAction::SetSupplier(supplier) => meta["supplier"] = json!(trimmed(supplier)),
            BulkAction::Archive | BulkAction::Unarchive => {}
        }
        self.audit(AuditEntry::new(action.audit_action(), None, Some(actor), meta))
            .await;
        Ok(touched)
    }

    pub async fn meta(&self) -> Result<CatalogMeta, CatalogError> {
        Ok(CatalogMeta {
            statuses: ItemStatus::ALL.to_vec(),
            categories: self.store.categories().await?,
            suppliers: self.store.suppliers().await?,
            units: UNITS.iter().map(|u| u.to_string()).collect(),
        })
    }

    pub async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, CatalogError> {
        Ok(self.store.audit_log(limit).await?)
    }

    async fn audit(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(err) = self.store.record_audit(entry).await {
            warn!(action = action.as_str(), error = %err, "failed to record audit entry");
        }
    }
}

/// Blank text clears the field.
fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
