//! Item catalogue endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use stockroom_auth::Permission;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::require;
use crate::context::PrincipalContext;

/// Default and maximum number of audit entries returned.
const AUDIT_LOG_DEFAULT: usize = 50;
const AUDIT_LOG_MAX: usize = 500;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/meta", get(get_meta))
        .route("/bulk", post(bulk_action))
        .route("/audit", get(get_audit_log))
        .route("/:id", get(get_item).put(update_item).delete(archive_item))
}

pub async fn get_meta(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    match services.catalog.meta().await {
        Ok(meta) => Json(dto::MetaResponse::from(meta)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListItemsQuery>, QueryRejection>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let query = match query {
        Ok(Query(q)) => match q.into_query() {
            Ok(q) => q,
            Err(resp) => return resp,
        },
        Err(e) => return errors::bad_request(e.body_text()),
    };
    match services.catalog.list(query).await {
        Ok(page) => Json(dto::ItemListResponse::from(&page)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let id = match dto::parse_item_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.catalog.get(id).await {
        Ok(detail) => Json(dto::ItemDetailResponse::from(&detail)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateItemRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_ITEMS_WRITE) {
        return resp;
    }
    let new = match body {
        Ok(Json(body)) => match body.into_new_item() {
            Ok(new) => new,
            Err(resp) => return resp,
        },
        Err(e) => return errors::bad_request(e.body_text()),
    };
    match services.catalog.create(new, principal.user_id()).await {
        Ok(item) => (StatusCode::CREATED, Json(dto::ItemResponse::from(&item))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateItemRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_ITEMS_WRITE) {
        return resp;
    }
    let id = match dto::parse_item_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let patch = match body {
        Ok(Json(body)) => match body.into_patch() {
            Ok(patch) => patch,
            Err(resp) => return resp,
        },
        Err(e) => return errors::bad_request(e.body_text()),
    };
    match services.catalog.update(id, patch, principal.user_id()).await {
        Ok(item) => Json(dto::ItemResponse::from(&item)).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

/// Soft delete; the item and its history stay queryable.
pub async fn archive_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_ITEMS_WRITE) {
        return resp;
    }
    let id = match dto::parse_item_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(e) = services.catalog.archive(id, principal.user_id()).await {
        return errors::catalog_error_to_response(e);
    }
    match services.catalog.get(id).await {
        Ok(detail) => Json(serde_json::json!({
            "ok": true,
            "item": dto::ItemResponse::from(&detail.item),
        }))
        .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn bulk_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::BulkRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_ITEMS_WRITE) {
        return resp;
    }
    let (action, ids) = match body {
        Ok(Json(body)) => match body.into_parts() {
            Ok(parts) => parts,
            Err(resp) => return resp,
        },
        Err(e) => return errors::bad_request(e.body_text()),
    };
    match services.catalog.bulk(action, &ids, principal.user_id()).await {
        Ok(count) => Json(serde_json::json!({ "ok": true, "count": count })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_audit_log(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AuditLogQuery>,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_ITEMS_WRITE) {
        return resp;
    }
    let limit = query.limit.unwrap_or(AUDIT_LOG_DEFAULT).clamp(1, AUDIT_LOG_MAX);
    match services.catalog.audit_log(limit).await {
        Ok(entries) => Json(dto::AuditLogResponse { entries }).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
