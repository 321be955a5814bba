use agrichain::api::{router, AppState};
use agrichain::ledger::synthetic::sample_batch;
use agrichain::ledger::{BatchLedger, SyntheticLedger};
use agrichain::store::MemoryStore;
use agrichain::{content_hash, BatchEngine};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_with(ledger: Option<Arc<dyn BatchLedger>>, timeout_ms: u64) -> Router {
    let engine = BatchEngine::new(Arc::new(MemoryStore::new()), ledger).with_ledger_timeout(timeout_ms);
    router(AppState::new(engine))
}

fn app() -> Router {
    app_with(None, 7000)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn missing_batch_id_is_bad_request() {
    let app = app();
    for uri in ["/batches/", "/batches", "/batches/%20"] {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body, json!({"error": "Missing batchId"}));
    }
}

#[tokio::test]
async fn register_then_lookup() {
    let app = app();
    let (status, sealed) = send(
        &app,
        "POST",
        "/batches/batch-001/metadata",
        Some(json!({"b": 2, "a": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sealed["metadataCanonical"], json!(r#"{"a":1,"b":2}"#));
    assert_eq!(sealed["metadataHash"], json!(content_hash(r#"{"a":1,"b":2}"#)));

    let (status, body) = send(&app, "GET", "/batches/batch-001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batchId"], json!("batch-001"));
    assert_eq!(body["metadataValid"], json!(true));
    assert_eq!(body["computedHash"], sealed["metadataHash"]);
    assert_eq!(body["metadata"]["metadata"], json!({"a": 1, "b": 2}));
    assert_eq!(body["onChainBatch"], Value::Null);
    assert_eq!(body["onChainHistory"], json!([]));
}

#[tokio::test]
async fn unknown_batch_reports_nulls() {
    let (status, body) = send(&app(), "GET", "/batches/batch-001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "batchId": "batch-001",
            "metadata": null,
            "metadataHash": null,
            "metadataCanonical": null,
            "computedHash": null,
            "metadataValid": false,
            "onChainBatch": null,
            "onChainHistory": []
        })
    );
}

#[tokio::test(start_paused = true)]
async fn ledger_timeout_still_returns_ok() {
    let ledger = Arc::new(SyntheticLedger::with_delay(Duration::from_secs(60)));
    ledger.insert(sample_batch("batch-001"), vec![]).await;
    let app = app_with(Some(ledger as Arc<dyn BatchLedger>), 50);

    let (status, body) = send(&app, "GET", "/batches/batch-001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["onChainBatch"], Value::Null);
    assert_eq!(body["onChainHistory"], json!([]));
}

#[tokio::test]
async fn on_chain_snapshot_serialized_camel_case() {
    let ledger = Arc::new(SyntheticLedger::new());
    ledger.insert(sample_batch("batch-001"), vec![]).await;
    let app = app_with(Some(ledger as Arc<dyn BatchLedger>), 7000);

    let (_, body) = send(&app, "GET", "/batches/batch-001", None).await;
    assert_eq!(body["onChainBatch"]["productType"], json!("maize"));
    assert_eq!(body["onChainBatch"]["exists"], json!(true));
}

#[tokio::test]
async fn malformed_metadata_body_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/batches/batch-001/metadata")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_crud_round() {
    let app = app();
    let listing = json!({
        "sellerId": "farmer-1",
        "name": "Red beans",
        "category": "legumes",
        "batchId": "batch-001",
        "price": 2.4,
        "quantity": 50,
        "unit": "kg"
    });
    let (status, created) = send(&app, "POST", "/products", Some(listing.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().expect("id").to_string();

    let (status, fetched) = send(&app, "GET", &format!("/products/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], json!("Red beans"));

    let (_, listed) = send(&app, "GET", "/products?sellerId=farmer-1", None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    let (_, listed) = send(&app, "GET", "/products?sellerId=farmer-2", None).await;
    assert_eq!(listed, json!([]));

    let mut changed = listing;
    changed["price"] = json!(3.1);
    let (status, updated) = send(&app, "PUT", &format!("/products/{}", id), Some(changed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], json!(3.1));
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let (status, _) = send(&app, "DELETE", &format!("/products/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "GET", &format!("/products/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error").contains(&id));
}

#[tokio::test]
async fn invalid_user_rejected() {
    let (status, body) = send(
        &app(),
        "POST",
        "/users",
        Some(json!({"displayName": "Kofi", "email": "not-an-email", "role": "farmer"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("email not-an-email is not valid"));

    let (status, _) = send(
        &app(),
        "POST",
        "/users",
        Some(json!({"displayName": "Kofi", "email": "kofi@example.org", "role": "astronaut"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forum_posts_filter_by_author() {
    let app = app();
    for author in ["u1", "u1", "u2"] {
        let (status, _) = send(
            &app,
            "POST",
            "/posts",
            Some(json!({"authorId": author, "title": "Storage tips", "body": "Keep grain dry", "tags": ["storage"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, posts) = send(&app, "GET", "/posts?authorId=u1", None).await;
    assert_eq!(posts.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn health_reports_store() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "store": "memory"}));
}
