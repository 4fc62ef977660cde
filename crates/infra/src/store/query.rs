//! Listing queries over the item catalogue.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use stockroom_inventory::{InventoryItem, ItemStatus, StockTransaction};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Name,
    Sku,
    Stock,
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "sku" => Some(Self::Sku),
            "stock" => Some(Self::Stock),
            "createdAt" | "created_at" => Some(Self::CreatedAt),
            "updatedAt" | "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    /// Column name in the relational schema.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Sku => "sku",
            Self::Stock => "stock",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn compare(&self, a: &InventoryItem, b: &InventoryItem) -> Ordering {
        match self {
            Self::Name => a.name.cmp(&b.name),
            Self::Sku => a.sku.cmp(&b.sku),
            Self::Stock => a.stock().cmp(&b.stock()),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filtered, sorted, paginated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub page: u32,
    pub limit: u32,
    /// Case-insensitive substring match on name, SKU, category or location.
    pub q: Option<String>,
    pub category: Option<String>,
    pub status: Option<ItemStatus>,
    /// Only items whose stock is below their threshold. Applied before pagination.
    pub low_stock_only: bool,
    pub sort_by: SortField,
    pub sort_dir: SortDir,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            q: None,
            category: None,
            status: None,
            low_stock_only: false,
            sort_by: SortField::default(),
            sort_dir: SortDir::default(),
        }
    }
}

impl ItemQuery {
    /// Clamp page and limit into their valid ranges and drop blank filters.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.q = self.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        self.category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// In-process evaluation of the filters, for stores without a query engine.
    pub fn matches(&self, item: &InventoryItem) -> bool {
        if let Some(q) = &self.q {
            let needle = q.to_lowercase();
            let hit = [
                Some(item.name.as_str()),
                Some(item.sku.as_str()),
                item.category.as_deref(),
                item.location.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if item.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if self.low_stock_only && !item.is_low() {
            return false;
        }
        true
    }

    /// Sort comparator honouring field and direction, tie-broken by id.
    pub fn compare(&self, a: &InventoryItem, b: &InventoryItem) -> Ordering {
        let ord = self.sort_by.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match self.sort_dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemPage {
    /// Number of items matching the filters, across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub rows: Vec<InventoryItem>,
}

/// An item together with its newest transaction rows, read from one snapshot:
/// `transactions[0]`, when present, is the row that produced `item`'s counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub item: InventoryItem,
    pub transactions: Vec<StockTransaction>,
}
