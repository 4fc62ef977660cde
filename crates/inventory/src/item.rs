use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ItemId};

use crate::stock::StockLevels;

/// Unit used when none is given.
pub const DEFAULT_UNIT: &str = "pcs";

/// Units offered to clients.
pub const UNITS: [&str; 6] = ["pcs", "box", "kg", "litre", "pack", "set"];

/// Lifecycle status. Items are archived, never deleted.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Active,
    Archived,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 2] = [ItemStatus::Active, ItemStatus::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "ACTIVE",
            ItemStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
    }
}

/// An inventory item record.
///
/// `stock` and `issued` are private: they change only through
/// [`InventoryItem::set_levels`], which the stock ledger calls inside a unit
/// of work. Catalogue edits go through [`ItemPatch`] and cannot reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub location: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub low_stock_threshold: i64,
    pub status: ItemStatus,
    #[serde(flatten)]
    levels: StockLevels,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Build a fresh item from validated input. `issued` starts at zero and
    /// `stock` at the seed value.
    pub fn create(id: ItemId, new: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id,
            sku: new.sku,
            name: new.name,
            category: new.category,
            unit: new.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            location: new.location,
            supplier: new.supplier,
            notes: new.notes,
            low_stock_threshold: new.low_stock_threshold,
            status: new.status,
            levels: StockLevels::new(new.stock, 0),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the counters wholesale; used when rehydrating persisted rows.
    pub fn with_levels(mut self, levels: StockLevels) -> Self {
        self.levels = levels;
        self
    }

    /// Record counters produced by a ledger operation.
    pub fn set_levels(&mut self, levels: StockLevels, at: DateTime<Utc>) {
        self.levels = levels;
        self.updated_at = at;
    }

    pub fn levels(&self) -> StockLevels {
        self.levels
    }

    pub fn stock(&self) -> i64 {
        self.levels.stock
    }

    pub fn issued(&self) -> i64 {
        self.levels.issued
    }

    pub fn is_low(&self) -> bool {
        self.levels.stock < self.low_stock_threshold
    }

    pub fn is_archived(&self) -> bool {
        self.status == ItemStatus::Archived
    }
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
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
    pub status: ItemStatus,
}

impl NewItem {
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Trim text fields, drop blank optionals and check the numeric bounds.
    pub fn validate(self) -> DomainResult<Self> {
        let sku = required("sku", &self.sku)?;
        let name = required("name", &self.name)?;
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if self.low_stock_threshold < 0 {
            return Err(DomainError::validation("lowStockThreshold cannot be negative"));
        }

        Ok(Self {
            sku,
            name,
            category: optional(self.category),
            unit: optional(self.unit),
            stock: self.stock,
            low_stock_threshold: self.low_stock_threshold,
            location: optional(self.location),
            supplier: optional(self.supplier),
            notes: optional(self.notes),
            status: self.status,
        })
    }
}

/// Partial catalogue update. Absent fields are left alone; blank strings
/// clear optional fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
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
    pub status: Option<ItemStatus>,
}

impl ItemPatch {
    pub fn validate(self) -> DomainResult<Self> {
        let sku = self.sku.as_deref().map(|s| required("sku", s)).transpose()?;
        let name = self.name.as_deref().map(|s| required("name", s)).transpose()?;
        if matches!(self.low_stock_threshold, Some(t) if t < 0) {
            return Err(DomainError::validation("lowStockThreshold cannot be negative"));
        }
        Ok(Self { sku, name, ..self })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to `item`; stock counters are never touched.
    pub fn apply_to(&self, item: &mut InventoryItem, now: DateTime<Utc>) {
        if let Some(sku) = &self.sku {
            item.sku = sku.clone();
        }
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = &self.category {
            item.category = optional(Some(category.clone()));
        }
        if let Some(unit) = &self.unit {
            item.unit = optional(Some(unit.clone())).unwrap_or_else(|| DEFAULT_UNIT.to_string());
        }
        if let Some(threshold) = self.low_stock_threshold {
            item.low_stock_threshold = threshold;
        }
        if let Some(location) = &self.location {
            item.location = optional(Some(location.clone()));
        }
        if let Some(supplier) = &self.supplier {
            item.supplier = optional(Some(supplier.clone()));
        }
        if let Some(notes) = &self.notes {
            item.notes = optional(Some(notes.clone()));
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        item.updated_at = now;
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_and_defaults() {
        let new = NewItem {
            sku: "  PEN-01 ".to_string(),
            name: " Whiteboard pen ".to_string(),
            category: Some("   ".to_string()),
            ..NewItem::default()
        }
        .validate()
        .unwrap();

        let item = InventoryItem::create(ItemId::new(), new, Utc::now());
        assert_eq!(item.sku, "PEN-01");
        assert_eq!(item.name, "Whiteboard pen");
        assert_eq!(item.category, None);
        assert_eq!(item.unit, DEFAULT_UNIT);
        assert_eq!(item.levels(), StockLevels::new(0, 0));
        assert_eq!(item.status, ItemStatus::Active);
    }

    #[test]
    fn empty_sku_is_rejected() {
        let err = NewItem::new(" ", "Marker").validate().unwrap_err();
        assert_eq!(err, DomainError::validation("sku cannot be empty"));
    }

    #[test]
    fn negative_seed_and_threshold_are_rejected() {
        assert!(NewItem::new("A", "B").with_stock(-1).validate().is_err());
        assert!(NewItem::new("A", "B").with_threshold(-1).validate().is_err());
    }

    #[test]
    fn low_flag_compares_stock_with_threshold() {
        let new = NewItem::new("A", "B").with_stock(3).with_threshold(5);
        let mut item = InventoryItem::create(ItemId::new(), new.validate().unwrap(), Utc::now());
        assert!(item.is_low());

        item.set_levels(StockLevels::new(5, 0), Utc::now());
        assert!(!item.is_low());
    }

    #[test]
    fn patch_leaves_counters_alone() {
        let new = NewItem::new("A", "B").with_stock(7).validate().unwrap();
        let mut item = InventoryItem::create(ItemId::new(), new, Utc::now());

        let patch = ItemPatch {
            name: Some("Renamed".to_string()),
            location: Some(String::new()),
            status: Some(ItemStatus::Archived),
            ..ItemPatch::default()
        }
        .validate()
        .unwrap();
        patch.apply_to(&mut item, Utc::now());

        assert_eq!(item.name, "Renamed");
        assert_eq!(item.location, None);
        assert!(item.is_archived());
        assert_eq!(item.stock(), 7);
    }

    #[test]
    fn patch_rejects_blank_name() {
        let patch = ItemPatch {
            name: Some("  ".to_string()),
            ..ItemPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn item_serializes_flat_counters() {
        let new = NewItem::new("A", "B").with_stock(2).validate().unwrap();
        let item = InventoryItem::create(ItemId::new(), new, Utc::now());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["stock"], 2);
        assert_eq!(json["issued"], 0);
        assert_eq!(json["status"], "ACTIVE");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(ItemStatus::parse("archived"), Some(ItemStatus::Archived));
        assert_eq!(ItemStatus::parse("deleted"), None);
    }
}
