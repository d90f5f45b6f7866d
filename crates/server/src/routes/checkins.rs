//! Daily check-ins.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use super::load_organization;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::CheckIn;
use crate::services::CheckInService;
use crate::services::checkin::CheckInOverview;
use crate::services::stats::clamp_days;
use crate::state::AppState;

/// Build the check-in router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/checkins", post(check_in))
        .route("/api/checkins/me", get(my_checkins))
}

/// Query parameters for the overview.
#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub days: Option<i64>,
}

/// Check in for today.
///
/// # Route
///
/// `POST /api/checkins`
///
/// # Errors
///
/// Returns 409 if the user already checked in today.
pub async fn check_in(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CheckIn>)> {
    let organization = load_organization(&state, &user).await?;
    let checkin = CheckInService::new(state.pool())
        .check_in(&user, &organization, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(checkin)))
}

/// Get today's check-in, streak, summary and history.
///
/// # Route
///
/// `GET /api/checkins/me?days=30`
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn my_checkins(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<CheckInOverview>> {
    let organization = load_organization(&state, &user).await?;
    let overview = CheckInService::new(state.pool())
        .overview(&user, &organization, clamp_days(query.days), Utc::now())
        .await?;

    Ok(Json(overview))
}
