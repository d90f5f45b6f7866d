//! Dashboard statistics.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::routes::load_organization;
use crate::services::StatsService;
use crate::services::stats::{OrganizationStats, clamp_days};
use crate::state::AppState;

/// Build the statistics router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/stats", get(organization_stats))
}

/// Query parameters for the dashboard.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i64>,
}

/// Get dashboard statistics for the last `days` days (1 to 90, default 30).
///
/// # Route
///
/// `GET /api/admin/stats?days=30`
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn organization_stats(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<OrganizationStats>> {
    let organization = load_organization(&state, &admin).await?;
    let stats = StatsService::new(state.pool())
        .organization_stats(&organization, clamp_days(query.days), Utc::now())
        .await?;

    Ok(Json(stats))
}
