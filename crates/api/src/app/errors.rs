use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use stockroom_infra::{CatalogError, LedgerError, StoreError};

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn invalid_id(raw: &str) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_id",
        format!("'{raw}' is not a valid item id"),
    )
}

fn storage_unavailable(message: impl Into<String>) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        axum::Json(json!({
            "error": "storage_unavailable",
            "message": message.into(),
            "retryable": true,
        })),
    )
        .into_response()
}

fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "Item not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Unavailable(msg) => storage_unavailable(msg),
        other => {
            tracing::error!(error = %other, "store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                other.to_string(),
            )
        }
    }
}

pub fn ledger_error_to_response(err: LedgerError) -> Response {
    let message = err.to_string();
    match err {
        LedgerError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", "Item not found"),
        LedgerError::InvalidQuantity(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", msg)
        }
        LedgerError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        LedgerError::ReturnExceedsIssued { .. } => {
            json_error(StatusCode::CONFLICT, "return_exceeds_issued", message)
        }
        LedgerError::NegativeResultingStock { .. } => {
            json_error(StatusCode::CONFLICT, "negative_resulting_stock", message)
        }
        LedgerError::StorageUnavailable(msg) => storage_unavailable(msg),
        LedgerError::Store(e) => store_error_to_response(e),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> Response {
    match err {
        CatalogError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "Item not found"),
        CatalogError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        CatalogError::Domain(e) => bad_request(e.to_string()),
        CatalogError::Store(e) => store_error_to_response(e),
    }
}
