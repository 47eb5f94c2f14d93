//! Integration tests for the HTTP API
//!
//! Each test drives the full router against its own temporary SQLite file.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use stocky_backend::{
    api::{create_router, AppState},
    fees::FeeSchedule,
    store::Store,
};

const USER: &str = "6f1c2b1e-0000-4000-8000-000000000001";

fn test_app() -> (Router, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let store = Store::open(temp_file.path().to_str().unwrap()).unwrap();
    let app = create_router(AppState::new(store, FeeSchedule::default()));
    (app, temp_file)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_version() {
    let (app, _temp) = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_reward_flow_and_duplicate() {
    let (app, _temp) = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/price-ticks",
        Some(json!([{ "stock_symbol": "RELIANCE", "price_inr": "2600" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appended"], 1);

    let reward = json!({
        "user_id": USER,
        "stock_symbol": "RELIANCE",
        "quantity": 10,
        "idempotency_key": "grant-1",
    });
    let (status, body) = send(&app, "POST", "/api/reward", Some(reward.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], "RELIANCE");
    assert_eq!(body["estimated_cost_inr"], "26032.1360");
    let reward_id = body["reward_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/api/reward", Some(reward)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "duplicate", "message": "reward already processed"}));

    let (status, body) = send(&app, "GET", &format!("/api/ledger/{}", reward_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 3);
    assert_eq!(body["entries"][0]["account"], "stock:RELIANCE");
    assert_eq!(body["entries"][1]["entry_type"], "CREDIT");
    assert_eq!(body["balance"]["debits"], body["balance"]["credits"]);

    let (status, body) = send(&app, "GET", &format!("/api/portfolio/{}", USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_value_inr"], "26000.0000");

    let (status, body) = send(&app, "GET", &format!("/api/today-stocks/{}", USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["stock_symbol"], "RELIANCE");

    let (status, body) = send(&app, "GET", &format!("/api/stats/{}", USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["portfolio_value_inr"], "26000.0000");

    let (status, body) = send(&app, "GET", &format!("/api/historical-inr/{}", USER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_reward_is_bad_request() {
    let (app, _temp) = test_app();

    for payload in [
        json!({"user_id": "u1", "stock_symbol": "TCS", "quantity": 1}),
        json!({"user_id": USER, "stock_symbol": "TCS", "quantity": "many"}),
        json!({"user_id": USER, "stock_symbol": "TCS", "quantity": -1}),
        json!({"user_id": USER, "stock_symbol": "TCS"}),
    ] {
        let (status, body) = send(&app, "POST", "/api/reward", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/reward")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corporate_action_endpoints() {
    let (app, _temp) = test_app();
    send(
        &app,
        "POST",
        "/api/price-ticks",
        Some(json!([{ "stock_symbol": "TCS", "price_inr": 3300, "fetched_at": "2025-01-02" }])),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/reward",
        Some(json!({"user_id": USER, "stock_symbol": "TCS", "quantity": "3"})),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/corporate-action",
        Some(json!({"action": "split", "symbol": "TCS", "ratio": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Corporate action applied successfully");
    assert_eq!(body["action"], "SPLIT");
    assert_eq!(body["rewards_affected"], 1);

    let (_, body) = send(&app, "GET", &format!("/api/portfolio/{}", USER), None).await;
    assert_eq!(body["holdings"][0]["quantity"], "9");
    assert_eq!(body["holdings"][0]["price_inr"], "1100.0000");
    assert_eq!(body["total_value_inr"], "9900.0000");

    let (status, _) = send(
        &app,
        "POST",
        "/api/corporate-action",
        Some(json!({"action": "DIVIDEND", "symbol": "TCS", "ratio": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/corporate-action",
        Some(json!({"action": "MERGER", "symbol": "TCS", "ratio": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/corporate-action",
        Some(json!({"action": "MERGER", "symbol": "TCS", "ratio": 2, "new_symbol": "TCS"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("must differ"));

    let (status, body) = send(&app, "GET", "/api/corporate-actions?symbol=TCS", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["action_type"], "SPLIT");
    assert_eq!(records[0]["parameter"]["ratio"], "3");
}

#[tokio::test]
async fn test_unknown_reward_ledger_is_not_found() {
    let (app, _temp) = test_app();
    let (status, body) = send(&app, "GET", "/api/ledger/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_negative_price_tick_rejected() {
    let (app, _temp) = test_app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/price-ticks",
        Some(json!([
            { "stock_symbol": "AXIS", "price_inr": 700 },
            { "stock_symbol": "AXIS", "price_inr": -1 },
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        "POST",
        "/api/reward",
        Some(json!({"user_id": USER, "stock_symbol": "AXIS", "quantity": 1})),
    )
    .await;
    assert_eq!(body["estimated_cost_inr"], "0.0000");
}

#[tokio::test]
async fn test_json_number_quantity_is_exact() {
    let (app, _temp) = test_app();
    let reward: Value = serde_json::from_str(&format!(
        r#"{{"user_id": "{}", "stock_symbol": "INFY", "quantity": 0.12345678901234567891}}"#,
        USER
    ))
    .unwrap();

    let (status, body) = send(&app, "POST", "/api/reward", Some(reward)).await;
    assert_eq!(status, StatusCode::OK);
    let reward_id = body["reward_id"].as_str().unwrap().to_string();

    let (_, body) = send(&app, "GET", &format!("/api/ledger/{}", reward_id), None).await;
    assert_eq!(body["entries"][0]["stock_quantity"], "0.12345678901234567891");

    let (_, body) = send(&app, "GET", &format!("/api/portfolio/{}", USER), None).await;
    assert_eq!(body["holdings"][0]["quantity"], "0.12345678901234567891");
}
