//! Catalogue audit trail.
//!
//! Stock operations are audited by their own transaction rows; this trail
//! covers catalogue edits (create, update, archive, bulk actions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{ItemId, UserId};

pub const ENTITY_INVENTORY_ITEM: &str = "InventoryItem";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Archive,
    BulkArchive,
    BulkUnarchive,
    BulkSetCategory,
    BulkSetSupplier,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Archive => "ARCHIVE",
            AuditAction::BulkArchive => "BULK_ARCHIVE",
            AuditAction::BulkUnarchive => "BULK_UNARCHIVE",
            AuditAction::BulkSetCategory => "BULK_SET_CATEGORY",
            AuditAction::BulkSetSupplier => "BULK_SET_SUPPLIER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Archive,
            AuditAction::BulkArchive,
            AuditAction::BulkUnarchive,
            AuditAction::BulkSetCategory,
            AuditAction::BulkSetSupplier,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity: String,
    /// Absent for bulk actions; the affected ids are listed in `meta`.
    pub entity_id: Option<ItemId>,
    pub actor: Option<UserId>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity_id: Option<ItemId>,
        actor: Option<UserId>,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            entity: ENTITY_INVENTORY_ITEM.to_string(),
            entity_id,
            actor,
            meta,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in [AuditAction::Create, AuditAction::BulkSetCategory] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                serde_json::Value::String(action.as_str().to_string())
            );
        }
        assert_eq!(AuditAction::parse("DELETE"), None);
    }
}
