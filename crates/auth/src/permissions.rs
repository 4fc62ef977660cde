use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "inventory.read"). The wildcard
/// permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// List, view and read metadata of inventory items.
    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory.read"));
    /// Create, edit, archive and bulk-edit catalogue entries.
    pub const INVENTORY_ITEMS_WRITE: Permission = Permission(Cow::Borrowed("inventory.items.write"));
    /// Issue, receive, adjust, return and dispose stock.
    pub const INVENTORY_STOCK_WRITE: Permission = Permission(Cow::Borrowed("inventory.stock.write"));
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → permission policy.
///
/// Every authenticated principal may read. `admin`, `manager` and `finance`
/// may also write the catalogue and move stock.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut perms = vec![Permission::INVENTORY_READ];

    let writer = roles
        .iter()
        .any(|r| r.is(&Role::ADMIN) || r.is(&Role::MANAGER) || r.is(&Role::FINANCE));
    if writer {
        perms.push(Permission::INVENTORY_ITEMS_WRITE);
        perms.push(Permission::INVENTORY_STOCK_WRITE);
    }

    perms
}
