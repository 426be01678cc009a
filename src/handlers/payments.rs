use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{
    entities::order::PaymentStatus, errors::ServiceError, services::payments::GatewayOrder,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentOrderRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

/// POST /api/v1/payments/order
///
/// Creates a remote gateway order ahead of the local order; the response
/// carries everything the storefront needs to open the checkout widget.
pub async fn create_payment_order(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentOrderRequest>,
) -> Result<Json<GatewayOrder>, ServiceError> {
    let order = state
        .payments
        .create_gateway_order(payload.amount, payload.currency)
        .await?;

    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// POST /api/v1/payments/verify
///
/// Verifies the gateway's payment confirmation proof and, on success, marks
/// the matching order's payment as completed. A mismatched signature answers
/// `verified: false` with a 4xx status and leaves persisted state untouched.
/// Safe to call twice with the same valid proof.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let verified = state.payments.verify_payment(
        &payload.gateway_order_id,
        &payload.gateway_payment_id,
        &payload.signature,
    )?;

    if !verified {
        warn!(
            gateway_order_id = %payload.gateway_order_id,
            "Payment signature verification failed"
        );
        let err = ServiceError::VerificationFailed;
        return Ok((
            err.status_code(),
            Json(json!({
                "verified": false,
                "error": err.to_string(),
            })),
        ));
    }

    state
        .orders
        .update_payment_by_gateway_order_id(
            &payload.gateway_order_id,
            PaymentStatus::Completed,
            Some(payload.gateway_payment_id.clone()),
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "verified": true,
            "message": "Payment verified successfully",
            "gateway_order_id": payload.gateway_order_id,
            "gateway_payment_id": payload.gateway_payment_id,
        })),
    ))
}
