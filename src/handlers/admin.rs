use axum::{extract::State, Json};

use crate::{errors::ServiceError, services::orders::DashboardStats, AppState};

/// GET /api/v1/admin/stats
///
/// Order totals, completed revenue, pending count, and the latest orders for
/// the dashboard landing page. Runs behind the external admin gate.
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ServiceError> {
    let stats = state.orders.dashboard_stats().await?;
    Ok(Json(stats))
}
