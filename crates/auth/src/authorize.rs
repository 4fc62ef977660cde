use std::collections::HashSet;

use thiserror::Error;

use stockroom_core::UserId;

use crate::{JwtClaims, Permission, Role, permissions_for_roles};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: Option<String>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions for validated claims through the role policy.
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username.clone(),
            roles: claims.roles.clone(),
            permissions: permissions_for_roles(&claims.roles),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&'static str]) -> Principal {
        let claims = JwtClaims {
            sub: UserId::new(),
            username: None,
            roles: roles.iter().map(|r| Role::new(*r)).collect(),
            iat: 0,
            exp: 1,
        };
        Principal::from_claims(&claims)
    }

    #[test]
    fn reader_cannot_move_stock() {
        let p = principal(&["viewer"]);
        assert_eq!(authorize(&p, &Permission::INVENTORY_READ), Ok(()));
        assert_eq!(
            authorize(&p, &Permission::INVENTORY_STOCK_WRITE),
            Err(AuthzError::Forbidden("inventory.stock.write".to_string()))
        );
    }

    #[test]
    fn finance_can_move_stock() {
        let p = principal(&["FINANCE"]);
        assert_eq!(authorize(&p, &Permission::INVENTORY_STOCK_WRITE), Ok(()));
        assert_eq!(authorize(&p, &Permission::INVENTORY_ITEMS_WRITE), Ok(()));
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = Principal {
            user_id: UserId::new(),
            username: None,
            roles: vec![],
            permissions: vec![Permission::WILDCARD],
        };
        assert_eq!(authorize(&p, &Permission::new("anything.at.all")), Ok(()));
    }
}
