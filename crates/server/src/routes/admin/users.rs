//! Member management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;

use worktally_core::{UserId, UserRole};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Organization, User};
use crate::routes::load_organization;
use crate::routes::responses::{InvitationResponse, UserResponse};
use crate::services::AuthService;
use crate::services::auth::{IssuedInvitation, validate_name};
use crate::state::AppState;

/// Build the member management router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/invitations", post(invite))
        .route(
            "/api/admin/users/{id}",
            patch(update_user).delete(delete_user),
        )
        .route("/api/admin/users/{id}/invitation", post(reissue_invitation))
}

/// Request for inviting a member.
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Request for updating a member. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<UserRole>,
}

/// Load a member of the admin's organization.
///
/// Users of other organizations are reported as not found.
async fn load_member(state: &AppState, admin: &User, id: i32) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(UserId::new(id))
        .await?
        .filter(|user| user.organization_id == admin.organization_id)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// Deliver an invitation by email, or log the link when email is disabled.
///
/// Returns whether the email was sent. Delivery failures do not fail the
/// request since the link is returned to the admin either way.
async fn deliver_invitation(
    state: &AppState,
    organization: &Organization,
    issued: &IssuedInvitation,
) -> InvitationResponse {
    let link = state.config().invitation_link(&issued.token);
    let user = &issued.user;

    let email_sent = match state.email() {
        Some(email) => match email
            .send_invitation(
                user.email.as_str(),
                &user.name,
                &organization.name,
                &link,
                state.config().invitation_ttl_days,
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to send invitation email");
                false
            }
        },
        None => {
            tracing::warn!(
                user_id = %user.id,
                email = %user.email,
                link = %link,
                "Email delivery disabled, share the invitation link manually"
            );
            false
        }
    };

    InvitationResponse {
        user: UserResponse::from(user),
        invitation_link: link,
        invitation_expires_at: user.invitation_expires_at,
        email_sent,
    }
}

/// List all members of the organization, pending ones included.
///
/// # Route
///
/// `GET /api/admin/users`
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list_users(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>> {
    let users = UserRepository::new(state.pool())
        .list_by_organization(admin.organization_id)
        .await?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// Invite a member.
///
/// # Route
///
/// `POST /api/admin/invitations`
///
/// # Errors
///
/// Returns 400 for invalid input and 409 if the email is already registered.
pub async fn invite(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>)> {
    let organization = load_organization(&state, &admin).await?;
    let issued = AuthService::new(state.pool(), state.config().invitation_ttl_days)
        .invite(&organization, &body.email, &body.name, body.role)
        .await?;

    tracing::info!(admin_id = %admin.id, user_id = %issued.user.id, "Invitation created");

    let response = deliver_invitation(&state, &organization, &issued).await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Issue a fresh invitation link to a pending member.
///
/// # Route
///
/// `POST /api/admin/users/{id}/invitation`
///
/// # Errors
///
/// Returns 404 for unknown members and 409 if the member is already active.
pub async fn reissue_invitation(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<InvitationResponse>> {
    let member = load_member(&state, &admin, id).await?;
    let organization = load_organization(&state, &admin).await?;

    let issued = AuthService::new(state.pool(), state.config().invitation_ttl_days)
        .reissue_invitation(&member)
        .await?;

    Ok(Json(deliver_invitation(&state, &organization, &issued).await))
}

/// Update a member's name or role.
///
/// # Route
///
/// `PATCH /api/admin/users/{id}`
///
/// # Errors
///
/// Returns 404 for unknown members and 409 when demoting the last admin.
pub async fn update_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let member = load_member(&state, &admin, id).await?;
    let repo = UserRepository::new(state.pool());

    let name = match body.name {
        Some(name) => validate_name("name", &name)?,
        None => member.name.clone(),
    };
    let role = body.role.unwrap_or(member.role);

    let updated = repo
        .update_profile(admin.organization_id, member.id, &name, role)
        .await?;
    tracing::info!(admin_id = %admin.id, user_id = %updated.id, role = %role, "Member updated");

    Ok(Json(UserResponse::from(&updated)))
}

/// Remove a member with their check-ins and presence.
///
/// # Route
///
/// `DELETE /api/admin/users/{id}`
///
/// # Errors
///
/// Returns 400 when deleting oneself and 409 when deleting the last admin.
pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let member = load_member(&state, &admin, id).await?;
    if member.id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot remove yourself".to_string(),
        ));
    }

    UserRepository::new(state.pool())
        .delete(admin.organization_id, member.id)
        .await?;
    tracing::info!(admin_id = %admin.id, user_id = %member.id, "Member removed");

    Ok(StatusCode::NO_CONTENT)
}
