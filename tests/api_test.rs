//! Router tests for the HTTP API
//!
//! Requests go through the full axum application with an in-memory store and a
//! fixed clock.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use tradebook::config::Config;
use tradebook::services::{ManualClock, SqliteStore};
use tradebook::{app, AppState};

const EMAIL: &str = "trader@example.com";

fn test_app() -> Router {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let clock = Arc::new(ManualClock::at_ms(1_700_000_000_000));
    app(AppState::new(Config::defaults(), store, clock))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn order_body(direction: &str, execution_type: &str, price: f64) -> Value {
    json!({
        "email": EMAIL,
        "direction": direction,
        "executionType": execution_type,
        "lot": 1,
        "price": price,
        "quantity": 50,
        "symbol": "NIFTY",
        "market": "NFO",
        "exchange": "NSE",
        "token": "35001"
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cachedQuotes"], 0);
}

#[tokio::test]
async fn test_place_and_list_orders() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("buy", "market", 100.0)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(body["order"]["side"], "buy");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/trading/orders?email={}", EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["buyOrders"].as_array().unwrap().len(), 1);
    assert_eq!(body["sellOrders"].as_array().unwrap().len(), 0);
    assert_eq!(body["totalOrders"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/trading/positions?email={}", EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPositions"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/inventory?email={}", EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inventory"][0]["quantity"], 50);
}

#[tokio::test]
async fn test_validation_errors_are_bad_request() {
    let app = test_app();

    let mut body = order_body("buy", "limit", 100.0);
    body["price"] = json!(0);
    let (status, error) = send(&app, Method::POST, "/api/trading/orders", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["code"].is_string());

    let (status, error) = send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("sideways", "limit", 100.0)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "BAD_REQUEST");

    let (status, _) = send(&app, Method::GET, "/api/trading/orders", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_account_and_order_are_not_found() {
    let app = test_app();

    let (status, error) = send(
        &app,
        Method::GET,
        "/api/trading/orders?email=ghost@example.com",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "ACCOUNT_NOT_FOUND");

    send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("buy", "limit", 90.0)),
    )
    .await;
    let (status, error) = send(
        &app,
        Method::POST,
        "/api/trading/orders/execute",
        Some(json!({ "email": EMAIL, "orderId": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_twice_is_state_error() {
    let app = test_app();

    let (_, placed) = send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("buy", "limit", 90.0)),
    )
    .await;
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();
    let cancel = json!({ "email": EMAIL, "orderId": order_id });

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trading/orders/cancel",
        Some(cancel.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["orderId"], order_id.as_str());

    let (status, error) = send(&app, Method::POST, "/api/trading/orders/cancel", Some(cancel)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "ORDER_NOT_CANCELABLE");
}

#[tokio::test]
async fn test_limit_check_fills_and_caches_price() {
    let app = test_app();

    send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("buy", "limit", 100.0)),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trading/limit-orders/check",
        Some(json!({ "symbol": "NIFTY", "market": "NFO", "currentPrice": 99.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalExecuted"], 1);
    assert_eq!(body["executedOrders"][0]["executedPrice"], 99.5);

    let (_, health) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(health["cachedQuotes"], 1);
}

#[tokio::test]
async fn test_close_position_response() {
    let app = test_app();

    let mut body = order_body("buy", "market", 5850.0);
    body["quantity"] = json!(100);
    body["target"] = json!(5920.0);
    let (_, placed) = send(&app, Method::POST, "/api/trading/orders", Some(body)).await;
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    let (status, closed) = send(
        &app,
        Method::POST,
        "/api/trading/positions/close",
        Some(json!({ "email": EMAIL, "orderId": order_id, "exitPrice": 5920.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["pnl"], 7000.0);
    assert_eq!(closed["tradeStatus"], "TARGET_HIT");
    assert_eq!(closed["exitPrice"], 5920.0);
}

#[tokio::test]
async fn test_trash_and_restore_routes() {
    let app = test_app();

    let (_, placed) = send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("buy", "market", 100.0)),
    )
    .await;
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/trading/orders/{}?email={}", order_id, EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, trash) = send(
        &app,
        Method::GET,
        &format!("/api/trading/trash?email={}", EMAIL),
        None,
    )
    .await;
    assert_eq!(trash["trash"].as_array().unwrap().len(), 1);

    let restore_uri = format!("/api/trading/orders/{}/restore?email={}", order_id, EMAIL);
    let (status, _) = send(&app, Method::POST, &restore_uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = send(&app, Method::POST, &restore_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NOT_IN_TRASH");
}

#[tokio::test]
async fn test_review_endpoints() {
    let app = test_app();

    send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("buy", "market", 100.0)),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/api/trading/orders",
        Some(order_body("sell", "market", 90.0)),
    )
    .await;

    let (status, report) = send(
        &app,
        Method::GET,
        &format!("/api/analytics?email={}&source=fifo", EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["summary"]["totalTrades"], 1);

    let (status, trades) = send(
        &app,
        Method::GET,
        &format!("/api/analytics/trades?email={}", EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trades["trades"].as_array().unwrap().len(), 1);

    let (status, synced) = send(
        &app,
        Method::POST,
        "/api/mistakes",
        Some(json!({ "email": EMAIL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(synced["success"], true);
    assert!(synced["added"].as_u64().unwrap() >= 1);

    let (status, risk) = send(
        &app,
        Method::PUT,
        "/api/risk/settings",
        Some(json!({ "email": EMAIL, "maxHighRiskTrades": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(risk["maxHighRiskTrades"], 2);

    let (status, risk) = send(
        &app,
        Method::GET,
        &format!("/api/risk?email={}", EMAIL),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(risk["status"], "SAFE");
}
