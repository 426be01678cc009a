use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    entities::order::PaymentStatus,
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderDetail, OrderSummary, StatusUpdate},
    AppState,
};

/// POST /api/v1/orders
///
/// Creates an order with its line items in one atomic write. For
/// gateway-paid orders the caller creates the remote gateway order first and
/// passes its id along, so a gateway failure never strands local state.
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let created = state.orders.create_order(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "order_id": created.order_id,
            "order_number": created.order_number,
            "message": "Order created successfully",
        })),
    ))
}

/// GET /api/v1/orders
///
/// Dashboard listing: all orders newest-first with item counts. Sits behind
/// the external admin gate.
pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderSummary>>, ServiceError> {
    let orders = state.orders.list_orders().await?;
    Ok(Json(orders))
}

/// GET /api/v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetail>, ServiceError> {
    let detail = state.orders.get_order(id).await?;
    Ok(Json(detail))
}

/// PUT /api/v1/orders/:id/status
///
/// Operator-driven partial update of either status axis. Authorization is
/// the caller's concern; an external admin gate runs before this handler.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Value>, ServiceError> {
    state.orders.update_status_fields(id, update).await?;
    Ok(Json(json!({ "message": "Order status updated successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub gateway_order_id: String,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
}

/// PUT /api/v1/orders/payment-status
///
/// Direct-set path used by the checkout flow after payment verification.
pub async fn update_payment_status(
    State(state): State<AppState>,
    Json(payload): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<Value>, ServiceError> {
    if payload.gateway_order_id.is_empty() {
        return Err(ServiceError::ValidationError(
            "Gateway order id and payment status are required".into(),
        ));
    }

    state
        .orders
        .update_payment_by_gateway_order_id(
            &payload.gateway_order_id,
            payload.payment_status,
            payload.gateway_payment_id,
        )
        .await?;

    Ok(Json(
        json!({ "message": "Payment status updated successfully" }),
    ))
}
