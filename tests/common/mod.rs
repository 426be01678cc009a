use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    routing::get,
    Router,
};
use serde_json::Value;
use storefront_api::{config::AppConfig, db, AppState};
use tower::ServiceExt;

/// Test harness backed by an in-memory SQLite database and the real router.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

/// Minimal configuration suitable for tests. The single pooled connection
/// keeps the in-memory database alive for the lifetime of the app.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new("sqlite::memory:", "127.0.0.1", 18080, "test");
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.gateway_key_id = Some("key_test_id".to_string());
    cfg.gateway_key_secret = Some("s3cret".to_string());
    cfg
}

impl TestApp {
    /// Construct a test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = Router::new()
            .route("/health", get(storefront_api::health_check))
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self { router, state }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
