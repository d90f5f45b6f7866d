//! Current user and presence heartbeat.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use worktally_core::PresenceStatus;

use super::load_organization;
use super::responses::{OrganizationResponse, UserResponse};
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::PresenceService;
use crate::state::AppState;

/// Build the current-user router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/me/status", put(update_status))
}

/// Response for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub organization: OrganizationResponse,
}

/// Request for a presence heartbeat.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PresenceStatus,
}

/// Response for a presence heartbeat.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: PresenceStatus,
    pub last_seen_at: DateTime<Utc>,
}

/// Get the logged-in user and their organization.
///
/// # Route
///
/// `GET /api/me`
///
/// # Errors
///
/// Returns an error if the organization cannot be loaded.
pub async fn me(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>> {
    let organization = load_organization(&state, &user).await?;

    Ok(Json(MeResponse {
        user: UserResponse::from(&user),
        organization: OrganizationResponse::from(&organization),
    }))
}

/// Record a presence heartbeat.
///
/// # Route
///
/// `PUT /api/me/status`
///
/// # Errors
///
/// Returns an error if the database update fails.
pub async fn update_status(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<StatusResponse>> {
    let presence = PresenceService::new(state.pool())
        .heartbeat(&user, body.status, Utc::now())
        .await?;

    Ok(Json(StatusResponse {
        status: presence.status,
        last_seen_at: presence.last_seen_at,
    }))
}
