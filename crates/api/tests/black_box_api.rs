use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use stockroom_api::app::{build_app, AppServices};
use stockroom_auth::{JwtClaims, Role};
use stockroom_core::UserId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = build_app(SECRET, Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt_with(secret: &str, roles: &[&str], ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        username: Some("tester".to_string()),
        roles: roles.iter().map(|r| Role::new(r.to_string())).collect(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn mint_jwt(roles: &[&str]) -> String {
    mint_jwt_with(SECRET, roles, ChronoDuration::minutes(10))
}

async fn create_item(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    body: Value,
) -> Value {
    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn stock_op(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    id: &str,
    op: &str,
    qty: i64,
) -> (StatusCode, Value) {
    let res = client
        .post(srv.url(&format!("/inventory/{id}/{op}")))
        .bearer_auth(token)
        .json(&json!({ "qty": qty }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/inventory")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let wrong_key = mint_jwt_with("other-secret", &["admin"], ChronoDuration::minutes(10));
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(wrong_key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let expired = mint_jwt_with(SECRET, &["admin"], ChronoDuration::minutes(-1));
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn whoami_echoes_claims() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(&["Manager"]);

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "tester");
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "Manager"));
    assert!(body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "inventory.stock.write"));
}

#[tokio::test]
async fn readers_cannot_write() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(&["admin"]);
    let reader = mint_jwt(&["viewer"]);

    let item = create_item(&client, &srv, &admin, json!({ "sku": "PEN-01", "name": "Pen", "stock": 5 })).await;
    let id = item["id"].as_str().unwrap();

    let res = client
        .get(srv.url(&format!("/inventory/{id}")))
        .bearer_auth(&reader)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&reader)
        .json(&json!({ "sku": "PEN-02", "name": "Pen" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let (status, body) = stock_op(&client, &srv, &reader, id, "issue", 1).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn stock_lifecycle_and_rejections() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(&["admin"]);

    let item = create_item(&client, &srv, &token, json!({ "sku": "PEN-01", "name": "Pen", "stock": 10 })).await;
    let id = item["id"].as_str().unwrap().to_string();
    assert_eq!(item["stock"], 10);
    assert_eq!(item["issued"], 0);

    let (status, body) = stock_op(&client, &srv, &token, &id, "issue", 5).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((body["stock"].as_i64(), body["issued"].as_i64()), (Some(5), Some(5)));

    let (status, body) = stock_op(&client, &srv, &token, &id, "issue", 10).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = stock_op(&client, &srv, &token, &id, "return", 6).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "return_exceeds_issued");

    let (status, body) = stock_op(&client, &srv, &token, &id, "adjust", -6).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "negative_resulting_stock");

    let (status, body) = stock_op(&client, &srv, &token, &id, "receive", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");

    let (status, body) = stock_op(&client, &srv, &token, &id, "return", 5).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((body["stock"].as_i64(), body["issued"].as_i64()), (Some(10), Some(0)));

    let (status, body) = stock_op(&client, &srv, &token, &id, "dispose", 4).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 6);

    let res = client
        .get(srv.url(&format!("/inventory/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let detail: Value = res.json().await.unwrap();
    let kinds: Vec<&str> = detail["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["type"].as_str().unwrap())
        .collect();
    // Newest first; rejected operations leave no rows.
    assert_eq!(kinds, ["DISPOSE", "RETURN", "ISSUE", "RECEIVE"]);
    assert_eq!(detail["transactions"][0]["stockAfter"], 6);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(&["admin"]);

    let (status, body) = stock_op(&client, &srv, &token, &UserId::new().to_string(), "receive", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = stock_op(&client, &srv, &token, "not-a-uuid", "receive", 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn catalogue_crud_list_and_bulk() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(&["admin"]);

    let a = create_item(
        &client,
        &srv,
        &token,
        json!({ "sku": "BOLT-M4", "name": "Bolt M4", "stock": 2, "lowStockThreshold": 5, "category": "Hardware" }),
    )
    .await;
    let b = create_item(&client, &srv, &token, json!({ "sku": "TAPE", "name": "Tape", "stock": 20 })).await;
    let a_id = a["id"].as_str().unwrap().to_string();
    let b_id = b["id"].as_str().unwrap().to_string();

    // Duplicate SKU.
    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&token)
        .json(&json!({ "sku": "TAPE", "name": "Other tape" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Stock cannot be edited through update.
    let res = client
        .put(srv.url(&format!("/inventory/{b_id}")))
        .bearer_auth(&token)
        .json(&json!({ "stock": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(srv.url(&format!("/inventory/{b_id}")))
        .bearer_auth(&token)
        .json(&json!({ "name": "Duct tape", "location": "Shelf 3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["name"], "Duct tape");
    assert_eq!(updated["stock"], 20);

    let res = client
        .get(srv.url("/inventory?lowStockOnly=true"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["rows"][0]["sku"], "BOLT-M4");
    assert_eq!(page["rows"][0]["low"], true);

    let res = client
        .get(srv.url("/inventory?q=tape&sortBy=name&sortDir=asc&limit=1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 1);

    let res = client
        .get(srv.url("/inventory?sortBy=price"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/inventory/bulk"))
        .bearer_auth(&token)
        .json(&json!({ "action": "SET_CATEGORY", "ids": [a_id, b_id], "payload": { "category": "Supplies" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "count": 2 }));

    let res = client
        .post(srv.url("/inventory/bulk"))
        .bearer_auth(&token)
        .json(&json!({ "action": "SET_SUPPLIER", "ids": [a_id], "payload": { "supplier": " Acme " } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "count": 1 }));

    let res = client
        .get(srv.url("/inventory/meta"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let meta: Value = res.json().await.unwrap();
    assert_eq!(meta["categories"], json!(["Supplies"]));
    assert_eq!(meta["suppliers"], json!(["Acme"]));
    assert_eq!(meta["statuses"], json!(["ACTIVE", "ARCHIVED"]));

    let res = client
        .delete(srv.url(&format!("/inventory/{a_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["item"]["status"], "ARCHIVED");

    let res = client
        .get(srv.url("/inventory?status=ACTIVE"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["rows"][0]["sku"], "TAPE");

    let res = client
        .get(srv.url("/inventory/audit?limit=10"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let log: Value = res.json().await.unwrap();
    assert_eq!(log["entries"][0]["action"], "ARCHIVE");
}
