//! Organization signup.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use worktally_core::OrganizationId;

use super::responses::UserResponse;
use crate::error::Result;
use crate::services::AuthService;
use crate::state::AppState;

/// Build the signup router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/signup", post(signup))
}

/// Request for creating an organization.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub organization_name: String,
    pub name: String,
    pub email: String,
}

/// Response for a created organization.
///
/// The signup link is returned directly to the person who signed up.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub organization_id: OrganizationId,
    pub user: UserResponse,
    pub signup_url: String,
    pub invitation_expires_at: Option<DateTime<Utc>>,
}

/// Create an organization with a pending admin.
///
/// # Route
///
/// `POST /api/signup`
///
/// # Errors
///
/// Returns 400 for invalid input and 409 if the email is already registered.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let issued = AuthService::new(state.pool(), state.config().invitation_ttl_days)
        .signup(&body.organization_name, &body.name, &body.email)
        .await?;

    let response = SignupResponse {
        organization_id: issued.user.organization_id,
        user: UserResponse::from(&issued.user),
        signup_url: state.config().invitation_link(&issued.token),
        invitation_expires_at: issued.user.invitation_expires_at,
    };

    Ok((StatusCode::CREATED, Json(response)))
}
