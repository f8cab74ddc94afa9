//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::OrderId;
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{InMemoryNotificationChannel, SimulatedGateway};
use store::InMemoryStorage;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_seed(seed: u64) -> (axum::Router, InMemoryNotificationChannel) {
    let (state, channel) =
        api::create_state(InMemoryStorage::new(), SimulatedGateway::with_seed(seed));
    (api::create_app(state, get_metrics_handle()), channel)
}

fn setup() -> axum::Router {
    setup_with_seed(0).0
}

/// Seed forcing the gateway outcome for the first order an app creates.
fn seed_for_first_order(want_success: bool) -> u64 {
    (0..10_000u64)
        .find(|&seed| SimulatedGateway::outcome(seed, OrderId::new(1)) == want_success)
        .expect("some seed in range forces the outcome")
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_check() {
    let app = setup();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let app = setup();

    let response = app.oneshot(empty_request("GET", "/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_order() {
    let app = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "total_amount_cents": 10_000 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["id"], 1);
    assert_eq!(json["state"], "PENDING_PAYMENT");
    assert_eq!(json["total_amount_cents"], 10_000);
    assert!(json["created_at"].as_str().is_some());
}

#[tokio::test]
async fn create_order_rejects_non_positive_amount() {
    let app = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "total_amount_cents": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn get_order_round_trip() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "total_amount_cents": 2_500 }),
        ))
        .await
        .unwrap();
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .oneshot(empty_request("GET", &format!("/orders/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], id);
    assert_eq!(json["state"], "PENDING_PAYMENT");
    assert_eq!(json["total_amount_cents"], 2_500);
}

#[tokio::test]
async fn get_missing_order_is_not_found() {
    let app = setup();

    let response = app
        .oneshot(empty_request("GET", "/orders/999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_order_id_is_a_bad_request() {
    let app = setup();

    let response = app
        .oneshot(empty_request("GET", "/orders/abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_and_outbox_delivery_flow() {
    let (app, channel) = setup_with_seed(seed_for_first_order(true));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "total_amount_cents": 10_000 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Pay the order.
    let response = app
        .clone()
        .oneshot(empty_request("POST", "/orders/1/payment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["order"]["state"], "PAID");
    assert_eq!(json["event"]["type"], "ORDER_PAID");
    assert_eq!(json["event"]["status"], "PENDING");
    assert_eq!(json["event"]["aggregate_id"], 1);

    // Paying again conflicts and leaves the order untouched.
    let response = app
        .clone()
        .oneshot(empty_request("POST", "/orders/1/payment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // One worker run delivers the event.
    let response = app
        .clone()
        .oneshot(empty_request("POST", "/outbox/run"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["processed"], true);
    assert_eq!(json["event"]["status"], "PROCESSED");
    assert_eq!(channel.message_count(), 1);

    // A second run finds nothing pending.
    let response = app
        .oneshot(empty_request("POST", "/outbox/run"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["processed"], false);
    assert!(json["event"].is_null());
    assert_eq!(channel.message_count(), 1);
}

#[tokio::test]
async fn declined_payment_reports_failure_state() {
    let (app, _channel) = setup_with_seed(seed_for_first_order(false));

    app.clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "total_amount_cents": 5_000 }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("POST", "/orders/1/payment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["order"]["state"], "PAYMENT_FAILED");
    assert_eq!(json["event"]["type"], "PAYMENT_FAILED");
}

#[tokio::test]
async fn payment_on_missing_order_is_not_found() {
    let app = setup();

    let response = app
        .oneshot(empty_request("POST", "/orders/42/payment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_order_flow() {
    let app = setup();

    app.clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "total_amount_cents": 1_000 }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/orders/1/cancel"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["state"], "CANCELLED");

    // Cancelling twice conflicts.
    let response = app
        .oneshot(empty_request("POST", "/orders/1/cancel"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
