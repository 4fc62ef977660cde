//! Wire shapes. The HTTP surface speaks camelCase JSON; domain types stay
//! free of presentation concerns.

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::ItemId;
use stockroom_infra::{
    AuditEntry, BulkAction, CatalogMeta, ItemDetail, ItemPage, ItemQuery, SortDir, SortField,
};
use stockroom_inventory::{InventoryItem, ItemPatch, ItemStatus, NewItem, StockTransaction};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CreateItemRequest {
    pub fn into_new_item(self) -> Result<NewItem, Response> {
        let status = parse_status(self.status.as_deref())?.unwrap_or_default();
        Ok(NewItem {
            sku: self.sku,
            name: self.name,
            category: self.category,
            unit: self.unit,
            stock: self.stock,
            low_stock_threshold: self.low_stock_threshold,
            location: self.location,
            supplier: self.supplier,
            notes: self.notes,
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Accepted only to reject it: counters move through stock operations.
    #[serde(default)]
    pub stock: Option<serde_json::Value>,
}

impl UpdateItemRequest {
    pub fn into_patch(self) -> Result<ItemPatch, Response> {
        if self.stock.is_some() {
            return Err(errors::bad_request(
                "stock cannot be edited directly; use receive, issue, adjust, return or dispose",
            ));
        }
        Ok(ItemPatch {
            sku: self.sku,
            name: self.name,
            category: self.category,
            unit: self.unit,
            low_stock_threshold: self.low_stock_threshold,
            location: self.location,
            supplier: self.supplier,
            notes: self.notes,
            status: parse_status(self.status.as_deref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StockOperationRequest {
    pub qty: i64,
    #[serde(default)]
    pub note: Option<String>,
}

impl StockOperationRequest {
    /// Blank notes are stored as absent.
    pub fn note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkPayload {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: String,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub payload: Option<BulkPayload>,
}

impl BulkRequest {
    pub fn into_parts(self) -> Result<(BulkAction, Vec<ItemId>), Response> {
        let action = match self.action.trim().to_ascii_uppercase().as_str() {
            "ARCHIVE" => BulkAction::Archive,
            "UNARCHIVE" => BulkAction::Unarchive,
            "SET_CATEGORY" => {
                BulkAction::SetCategory(self.payload.unwrap_or_default().category)
            }
            "SET_SUPPLIER" => {
                BulkAction::SetSupplier(self.payload.unwrap_or_default().supplier)
            }
            other => {
                return Err(errors::bad_request(format!(
                    "unknown bulk action '{other}' \
                     (expected ARCHIVE, UNARCHIVE, SET_CATEGORY or SET_SUPPLIER)"
                )));
            }
        };
        let ids = self
            .ids
            .iter()
            .map(|raw| parse_item_id(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((action, ids))
    }
}

/// Raw list query string; every field is optional and validated on conversion.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub q: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub low_stock_only: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
}

impl ListItemsQuery {
    pub fn into_query(self) -> Result<ItemQuery, Response> {
        let defaults = ItemQuery::default();

        let low_stock_only = match self.low_stock_only.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                return Err(errors::bad_request(format!(
                    "lowStockOnly must be true or false, got '{v}'"
                )));
            }
        };

        let sort_by = match self.sort_by.as_deref().filter(|s| !s.is_empty()) {
            None => SortField::default(),
            Some(s) => SortField::parse(s).ok_or_else(|| {
                errors::bad_request(format!(
                    "sortBy must be one of name, sku, stock, createdAt, updatedAt; got '{s}'"
                ))
            })?,
        };

        let sort_dir = match self.sort_dir.as_deref().filter(|s| !s.is_empty()) {
            None => SortDir::default(),
            Some(s) => SortDir::parse(s).ok_or_else(|| {
                errors::bad_request(format!("sortDir must be asc or desc; got '{s}'"))
            })?,
        };

        Ok(ItemQuery {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
            q: self.q,
            category: self.category,
            status: parse_status(self.status.as_deref())?,
            low_stock_only,
            sort_by,
            sort_dir,
        }
        .normalized())
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<usize>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub stock: i64,
    pub issued: i64,
    pub low_stock_threshold: i64,
    /// Stock is below the threshold.
    pub low: bool,
    pub location: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&InventoryItem> for ItemResponse {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id.to_string(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            unit: item.unit.clone(),
            stock: item.stock(),
            issued: item.issued(),
            low_stock_threshold: item.low_stock_threshold,
            low: item.is_low(),
            location: item.location.clone(),
            supplier: item.supplier.clone(),
            notes: item.notes.clone(),
            status: item.status,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: String,
    pub item_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub qty: i64,
    pub stock_after: i64,
    pub issued_after: i64,
    pub note: Option<String>,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StockTransaction> for TransactionResponse {
    fn from(tx: &StockTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            item_id: tx.item_id.to_string(),
            kind: tx.kind.as_str(),
            qty: tx.qty,
            stock_after: tx.stock_after,
            issued_after: tx.issued_after,
            note: tx.note.clone(),
            actor_id: tx.actor.to_string(),
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemDetailResponse {
    #[serde(flatten)]
    pub item: ItemResponse,
    pub transactions: Vec<TransactionResponse>,
}

impl From<&ItemDetail> for ItemDetailResponse {
    fn from(detail: &ItemDetail) -> Self {
        Self {
            item: ItemResponse::from(&detail.item),
            transactions: detail.transactions.iter().map(TransactionResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub rows: Vec<ItemResponse>,
}

impl From<&ItemPage> for ItemListResponse {
    fn from(page: &ItemPage) -> Self {
        Self {
            total: page.total,
            page: page.page,
            limit: page.limit,
            rows: page.rows.iter().map(ItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub statuses: Vec<&'static str>,
    pub categories: Vec<String>,
    pub suppliers: Vec<String>,
    pub units: Vec<String>,
}

impl From<CatalogMeta> for MetaResponse {
    fn from(meta: CatalogMeta) -> Self {
        Self {
            statuses: meta.statuses.iter().map(|s| s.as_str()).collect(),
            categories: meta.categories,
            suppliers: meta.suppliers,
            units: meta.units,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditEntry>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_item_id(raw: &str) -> Result<ItemId, Response> {
    raw.trim().parse::<ItemId>().map_err(|_| errors::invalid_id(raw))
}

fn parse_status(raw: Option<&str>) -> Result<Option<ItemStatus>, Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ItemStatus::parse(s).map(Some).ok_or_else(|| {
            errors::bad_request(format!("status must be ACTIVE or ARCHIVED; got '{s}'"))
        }),
    }
}
