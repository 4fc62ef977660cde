//! API-side authorization guard.
//!
//! Handlers call [`require`] before touching the ledger or catalogue, so a
//! forbidden request never reaches storage.

use axum::http::StatusCode;
use axum::response::Response;

use stockroom_auth::{authorize, Permission};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Check one permission for the current request; `Err` is a ready 403 response.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(principal.principal(), permission).map_err(|e| {
        tracing::debug!(user_id = %principal.user_id(), permission = %permission, "forbidden");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}
