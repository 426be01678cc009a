//! Storefront API Library
//!
//! Order-processing core for a small online storefront: atomic order
//! capture, payment gateway integration, and the admin status lifecycle.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state. Built once at startup and cloned into every
/// handler; the datastore handle is an explicitly owned object, never a
/// process-wide static.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub orders: services::orders::OrderService,
    pub payments: services::payments::PaymentService,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let orders = services::orders::OrderService::new(db.clone());
        let payments = services::payments::PaymentService::new(&config);
        Self {
            db,
            config,
            orders,
            payments,
        }
    }
}

/// Routes under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route(
            "/orders/payment-status",
            put(handlers::orders::update_payment_status),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        );

    let payments = Router::new()
        .route(
            "/payments/order",
            post(handlers::payments::create_payment_order),
        )
        .route("/payments/verify", post(handlers::payments::verify_payment));

    // Admin surface; the session gate in front of it is an external concern.
    let admin = Router::new().route("/admin/stats", get(handlers::admin::dashboard_stats));

    Router::new()
        .route("/status", get(api_status))
        .merge(orders)
        .merge(payments)
        .merge(admin)
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "storefront-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /health — reports datastore connectivity.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
