//! Stock operation endpoints: one POST per transaction type.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use stockroom_auth::Permission;
use stockroom_inventory::TransactionType;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/issue", post(issue))
        .route("/:id/receive", post(receive))
        .route("/:id/adjust", post(adjust))
        .route("/:id/return", post(return_stock))
        .route("/:id/dispose", post(dispose))
}

type Body = Result<Json<dto::StockOperationRequest>, JsonRejection>;

pub async fn issue(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Body,
) -> Response {
    apply(services, principal, id, TransactionType::Issue, body).await
}

pub async fn receive(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Body,
) -> Response {
    apply(services, principal, id, TransactionType::Receive, body).await
}

pub async fn adjust(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Body,
) -> Response {
    apply(services, principal, id, TransactionType::Adjust, body).await
}

pub async fn return_stock(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Body,
) -> Response {
    apply(services, principal, id, TransactionType::Return, body).await
}

pub async fn dispose(
    services: Extension<Arc<AppServices>>,
    principal: Extension<PrincipalContext>,
    id: Path<String>,
    body: Body,
) -> Response {
    apply(services, principal, id, TransactionType::Dispose, body).await
}

async fn apply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    kind: TransactionType,
    body: Body,
) -> Response {
    if let Err(resp) = require(&principal, &Permission::INVENTORY_STOCK_WRITE) {
        return resp;
    }
    let id = match dto::parse_item_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = match body {
        Ok(Json(body)) => body,
        Err(e) => return errors::bad_request(e.body_text()),
    };

    match services
        .ledger
        .apply_kind(id, kind, body.qty, body.note(), principal.user_id())
        .await
    {
        Ok(item) => Json(dto::ItemResponse::from(&item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
