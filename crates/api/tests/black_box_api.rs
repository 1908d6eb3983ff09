use std::sync::Arc;

use creditpost_api::app::{build_app, services::AppServices};
use creditpost_infra::InMemoryStore;
use creditpost_infra::db::seed::{ACME_ID, BLUE_ID, GREEN_ID, RED_ID};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

struct TestServer {
    base_url: String,
    store: InMemoryStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory demo data, ephemeral port.
        let store = InMemoryStore::with_demo_data();
        let app = build_app(Arc::new(AppServices::in_memory(store.clone())));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
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

async fn post_json(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn purchase_then_replay_returns_same_order() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = json!({
        "businessId": ACME_ID.to_string(),
        "idempotencyKey": Uuid::new_v4().to_string(),
        "items": [{ "product_id": RED_ID.to_string(), "qty": 10 }]
    });

    let (status, first) = post_json(&client, srv.url("/purchase"), body.clone()).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let order_id = first["orderId"].as_str().unwrap().to_string();

    let (status, second) = post_json(&client, srv.url("/purchase"), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["orderId"], order_id.as_str());

    assert_eq!(srv.store.product(RED_ID).unwrap().unwrap().stock, 90);
    assert_eq!(
        srv.store.credit_account(ACME_ID).unwrap().unwrap().balance_cents,
        15_000
    );
    assert_eq!(srv.store.orders(ACME_ID).unwrap().len(), 1);
}

#[tokio::test]
async fn purchase_errors_map_to_status_codes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let purchase = |product: String, qty: i64| {
        json!({
            "businessId": ACME_ID.to_string(),
            "idempotencyKey": Uuid::new_v4().to_string(),
            "items": [{ "productId": product, "qty": qty }]
        })
    };

    let (status, body) = post_json(&client, srv.url("/purchase"), purchase(RED_ID.to_string(), 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = post_json(&client, srv.url("/purchase"), purchase("nope".into(), 1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = post_json(&client, srv.url("/purchase"), purchase(GREEN_ID.to_string(), 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = post_json(&client, srv.url("/purchase"), purchase(BLUE_ID.to_string(), 51)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");

    let res = client
        .post(srv.url("/purchase"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing above touched the books.
    assert_eq!(srv.store.credit_account(ACME_ID).unwrap().unwrap().balance_cents, 0);
    assert!(srv.store.ledger(ACME_ID).unwrap().is_empty());
}

#[tokio::test]
async fn catalog_flow_and_credit_limit() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        srv.url("/businesses"),
        json!({ "name": "Initech", "creditLimitCents": 10_000 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let business_id = body["businessId"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &client,
        srv.url("/products"),
        json!({
            "businessId": business_id,
            "sku": "TPS-1",
            "name": "TPS Cover Sheet",
            "stock": 100,
            "priceCents": 3000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let product_id = body["productId"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &client,
        srv.url("/products"),
        json!({
            "businessId": business_id,
            "sku": "TPS-1",
            "name": "Duplicate",
            "stock": 1,
            "priceCents": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // 4 * 3000 = 12_000 exceeds the 10_000 limit.
    let (status, body) = post_json(
        &client,
        srv.url("/purchase"),
        json!({
            "businessId": business_id,
            "idempotencyKey": Uuid::new_v4().to_string(),
            "items": [{ "product_id": product_id, "qty": 4 }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "credit_limit_exceeded");

    // Cut the price, then the same purchase fits.
    let res = client
        .patch(srv.url(&format!("/products/{product_id}")))
        .json(&json!({ "businessId": business_id, "priceCents": 2500 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, body) = post_json(
        &client,
        srv.url("/purchase"),
        json!({
            "businessId": business_id,
            "idempotencyKey": Uuid::new_v4().to_string(),
            "items": [{ "product_id": product_id, "qty": 4 }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn product_patch_validation_and_ownership() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .patch(srv.url(&format!("/products/{RED_ID}")))
        .json(&json!({ "businessId": ACME_ID.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .patch(srv.url(&format!("/products/{GREEN_ID}")))
        .json(&json!({ "businessId": ACME_ID.to_string(), "stock": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .patch(srv.url("/products/not-a-uuid"))
        .json(&json!({ "businessId": ACME_ID.to_string(), "stock": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overdue_reports_are_empty_for_fresh_orders() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, _) = post_json(
        &client,
        srv.url("/purchase"),
        json!({
            "businessId": ACME_ID.to_string(),
            "idempotencyKey": Uuid::new_v4().to_string(),
            "items": [{ "product_id": RED_ID.to_string(), "qty": 1 }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/overdue?businessId={ACME_ID}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body.is_null());

    let res = client.get(srv.url("/overdue-businesses")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pageSize"], 20);

    // A far-future dueBefore makes the fresh order count.
    let res = client
        .get(srv.url("/overdue-businesses?dueBefore=2999-01-01&pageSize=5"))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["business_id"], ACME_ID.to_string());
    assert_eq!(body["items"][0]["overdue_cents"], 1500);

    let res = client
        .get(srv.url("/overdue-businesses?pageSize=1000"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/overdue")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
