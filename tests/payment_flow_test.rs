//! End-to-end tests for the payment flow: remote gateway order creation,
//! signature verification, and payment-status reconciliation.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_SECRET: &str = "s3cret";

fn sign(order_ref: &str, payment_ref: &str, secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{order_ref}|{payment_ref}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn gateway_order_payload(gateway_order_id: &str) -> Value {
    json!({
        "customer_name": "Asha Rao",
        "customer_email": "asha@example.com",
        "customer_phone": "9876543210",
        "customer_address": "12 Harbour Lane, Kochi",
        "items": [
            { "product_id": 1, "quantity": 2, "price": "180.00", "subtotal": "360.00" }
        ],
        "total_amount": "360.00",
        "gateway_order_id": gateway_order_id
    })
}

async fn create_gateway_paid_order(app: &TestApp, gateway_order_id: &str) -> i64 {
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(gateway_order_payload(gateway_order_id)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["order_id"].as_i64().unwrap()
}

#[tokio::test]
async fn valid_signature_verifies_and_marks_payment_completed() {
    let app = TestApp::new().await;
    let order_id = create_gateway_paid_order(&app, "order_abc").await;

    let signature = sign("order_abc", "pay_xyz", TEST_SECRET);
    let verify_body = json!({
        "gateway_order_id": "order_abc",
        "gateway_payment_id": "pay_xyz",
        "signature": signature
    });

    let response = app
        .request(Method::POST, "/api/v1/payments/verify", Some(verify_body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["verified"], true);
    assert_eq!(body["gateway_order_id"], "order_abc");

    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["gateway_payment_id"], "pay_xyz");
    // the fulfillment axis is untouched by payment reconciliation
    assert_eq!(order["order_status"], "pending");

    // Re-verifying with the same valid proof is safe and idempotent.
    let response = app
        .request(Method::POST, "/api/v1/payments/verify", Some(verify_body))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["gateway_payment_id"], "pay_xyz");
}

#[tokio::test]
async fn mismatched_signature_answers_verified_false_and_mutates_nothing() {
    let app = TestApp::new().await;
    let order_id = create_gateway_paid_order(&app, "order_abc").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(json!({
                "gateway_order_id": "order_abc",
                "gateway_payment_id": "pay_xyz",
                "signature": "deadbeef"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["verified"], false);

    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(order["payment_status"], "pending");
    assert!(order["gateway_payment_id"].is_null());
}

#[tokio::test]
async fn missing_verification_inputs_are_invalid_rather_than_mismatched() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(json!({
                "gateway_order_id": "order_abc",
                "gateway_payment_id": "pay_xyz",
                "signature": ""
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    // invalid input is an error body, not a verified:false verdict
    assert!(body.get("verified").is_none());
}

#[tokio::test]
async fn valid_signature_for_unknown_gateway_order_is_not_found() {
    let app = TestApp::new().await;

    let signature = sign("order_ghost", "pay_1", TEST_SECRET);
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(json!({
                "gateway_order_id": "order_ghost",
                "gateway_payment_id": "pay_1",
                "signature": signature
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_status_update_is_idempotent() {
    let app = TestApp::new().await;
    let order_id = create_gateway_paid_order(&app, "order_idem").await;

    let update = json!({
        "gateway_order_id": "order_idem",
        "gateway_payment_id": "pay_idem",
        "payment_status": "completed"
    });

    for _ in 0..2 {
        let response = app
            .request(
                Method::PUT,
                "/api/v1/orders/payment-status",
                Some(update.clone()),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["gateway_payment_id"], "pay_idem");
}

#[tokio::test]
async fn payment_status_update_requires_a_matching_order() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/orders/payment-status",
            Some(json!({
                "gateway_order_id": "order_nowhere",
                "payment_status": "failed"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_status_update_requires_the_gateway_order_id() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/orders/payment-status",
            Some(json!({
                "gateway_order_id": "",
                "payment_status": "completed"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gateway_order_creation_scales_to_minor_units() {
    let mock_gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_remote_1",
            "amount": 36000,
            "currency": "INR",
            "status": "created"
        })))
        .expect(1)
        .mount(&mock_gateway)
        .await;

    let mut cfg = common::test_config();
    cfg.gateway_api_base = mock_gateway.uri();
    let app = TestApp::with_config(cfg).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/order",
            Some(json!({ "amount": "360.00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["order_id"], "order_remote_1");
    assert_eq!(body["amount"], 36000);
    assert_eq!(body["currency"], "INR");
    // the public key goes back to the storefront for checkout initiation
    assert_eq!(body["key_id"], "key_test_id");
}

#[tokio::test]
async fn gateway_remote_failure_is_a_server_error_never_a_fake_success() {
    let mock_gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_gateway)
        .await;

    let mut cfg = common::test_config();
    cfg.gateway_api_base = mock_gateway.uri();
    let app = TestApp::with_config(cfg).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/order",
            Some(json!({ "amount": "360.00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn missing_gateway_credentials_fail_fast_with_an_operator_hint() {
    let mut cfg = common::test_config();
    cfg.gateway_key_id = None;
    cfg.gateway_key_secret = None;
    let app = TestApp::with_config(cfg).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/order",
            Some(json!({ "amount": "360.00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("credentials"));

    // verification depends on the same credentials
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            Some(json!({
                "gateway_order_id": "order_abc",
                "gateway_payment_id": "pay_xyz",
                "signature": "deadbeef"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn non_positive_amounts_are_rejected_before_any_remote_call() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/order",
            Some(json!({ "amount": "0" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn orders_are_found_by_gateway_order_id() {
    let app = TestApp::new().await;
    let order_id = create_gateway_paid_order(&app, "order_lookup").await;

    let order = app
        .state
        .orders
        .find_by_gateway_order_id("order_lookup")
        .await
        .unwrap()
        .expect("order by gateway id");
    assert_eq!(order.id, order_id);

    let missing = app
        .state
        .orders
        .find_by_gateway_order_id("order_unknown")
        .await
        .unwrap();
    assert!(missing.is_none());
}
