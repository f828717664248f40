//! Portal API integration tests

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use hotspot_api::{build_router, AppState};
use hotspot_core::{NullGateway, PortalConfig, PortalEngine};
use serde_json::{json, Value};
use std::sync::Arc;

const MAC: &str = "AA:BB:CC:DD:EE:FF";
const ADMIN_KEY: &str = "super-secret";

fn admin_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-admin-key"),
        HeaderValue::from_static(ADMIN_KEY),
    )
}

fn test_server() -> TestServer {
    let config = PortalConfig::default();
    let engine = Arc::new(PortalEngine::new(&config, Arc::new(NullGateway)));
    let state = AppState {
        engine,
        admin_key: ADMIN_KEY.into(),
    };
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn test_voucher_redemption_flow() {
    let server = test_server();
    let (name, value) = admin_header();

    let generated = server
        .post("/api/vouchers/generate")
        .add_header(name, value)
        .json(&json!({ "package_id": "quick-browse", "quantity": 2 }))
        .await;
    generated.assert_status(StatusCode::OK);
    let body: Value = generated.json();
    let code = body["data"][0]["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    let redeemed = server
        .post("/api/vouchers/redeem")
        .json(&json!({ "code": code, "mac_address": MAC }))
        .await;
    redeemed.assert_status(StatusCode::OK);
    let body: Value = redeemed.json();
    assert_eq!(body["data"]["session"]["status"], "active");
    assert_eq!(body["data"]["package"]["duration_minutes"], 60);

    // Second redemption of the same code fails without leaking why.
    let again = server
        .post("/api/vouchers/redeem")
        .json(&json!({ "code": code, "mac_address": MAC }))
        .await;
    again.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = again.json();
    assert_eq!(body["error"]["code"], "invalid-or-used-code");
}

#[tokio::test]
async fn test_admin_routes_require_key() {
    let server = test_server();

    let no_key = server
        .post("/api/vouchers/generate")
        .json(&json!({ "package_id": "quick-browse", "quantity": 1 }))
        .await;
    no_key.assert_status(StatusCode::UNAUTHORIZED);

    let wrong_key = server
        .get("/api/sessions")
        .add_header(
            HeaderName::from_static("x-admin-key"),
            HeaderValue::from_static("guess"),
        )
        .await;
    wrong_key.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_payment_callback_flow() {
    let server = test_server();

    let initiated = server
        .post("/api/payments/initiate")
        .json(&json!({
            "package_id": "quick-browse",
            "phone_number": "254700000001",
            "mac_address": MAC,
            "checkout_request_id": "ws_1"
        }))
        .await;
    initiated.assert_status(StatusCode::OK);
    let body: Value = initiated.json();
    let session_id = body["data"]["session"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["session"]["status"], "pending");

    let callback = json!({
        "Body": {
            "stkCallback": {
                "CheckoutRequestID": "ws_1",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 10.0 },
                        { "Name": "MpesaReceiptNumber", "Value": "QGR7XYZ1" }
                    ]
                }
            }
        }
    });

    let processed = server.post("/api/payments/callback").json(&callback).await;
    processed.assert_status(StatusCode::OK);
    let body: Value = processed.json();
    assert_eq!(body["data"]["status"], "activated");

    // Replay is a no-op.
    let replay = server.post("/api/payments/callback").json(&callback).await;
    replay.assert_status(StatusCode::OK);
    let body: Value = replay.json();
    assert_eq!(body["data"]["status"], "already-processed");

    let payment = server.get("/api/payments/ws_1").await;
    payment.assert_status(StatusCode::OK);
    let body: Value = payment.json();
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["receipt_number"], "QGR7XYZ1");
    assert_eq!(
        body["data"]["reconnection_code"].as_str().unwrap().len(),
        6
    );

    let authorized = server
        .post(&format!("/api/sessions/{session_id}/authorize"))
        .json(&json!({ "mac_address": MAC }))
        .await;
    authorized.assert_status(StatusCode::OK);
    let body: Value = authorized.json();
    assert_eq!(body["data"]["authorized"], true);
    assert!(body["data"]["remaining_secs"].as_u64().unwrap() > 3500);
}

#[tokio::test]
async fn test_disconnect_actor_gating() {
    let server = test_server();
    let (name, value) = admin_header();

    let generated = server
        .post("/api/vouchers/generate")
        .add_header(name, value)
        .json(&json!({ "package_id": "quick-browse", "quantity": 1 }))
        .await;
    let body: Value = generated.json();
    let code = body["data"][0]["code"].as_str().unwrap().to_string();

    let redeemed = server
        .post("/api/vouchers/redeem")
        .json(&json!({ "code": code, "mac_address": MAC }))
        .await;
    let body: Value = redeemed.json();
    let session_id = body["data"]["session"]["id"].as_str().unwrap().to_string();

    // Admin disconnect without the key is rejected.
    let denied = server
        .post(&format!("/api/sessions/{session_id}/disconnect"))
        .json(&json!({ "actor": "admin" }))
        .await;
    denied.assert_status(StatusCode::UNAUTHORIZED);

    // The user can end their own session by id.
    let user_disconnect = server
        .post(&format!("/api/sessions/{session_id}/disconnect"))
        .json(&json!({ "actor": "user" }))
        .await;
    user_disconnect.assert_status(StatusCode::OK);
    let body: Value = user_disconnect.json();
    assert_eq!(body["data"]["status"], "terminated");

    // Disconnect is idempotent.
    let repeat = server
        .post(&format!("/api/sessions/{session_id}/disconnect"))
        .json(&json!({ "actor": "user" }))
        .await;
    repeat.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_callback_reference_rejected() {
    let server = test_server();

    let callback = json!({
        "Body": {
            "stkCallback": {
                "CheckoutRequestID": "ws_never_seen",
                "ResultCode": 0,
                "ResultDesc": "ok"
            }
        }
    });

    let processed = server.post("/api/payments/callback").json(&callback).await;
    processed.assert_status(StatusCode::NOT_FOUND);
    let body: Value = processed.json();
    assert_eq!(body["error"]["code"], "payment-not-found");
}
