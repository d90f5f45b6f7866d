//! HTTP route handlers for the Worktally API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                           - Liveness
//! GET    /health/ready                     - Database readiness
//!
//! # Signup and Jira OAuth
//! POST   /api/signup                       - Create organization + pending admin
//! GET    /auth/jira/login                  - Redirect to Atlassian
//! GET    /auth/jira/signup?token=          - Validate invitation, redirect to Atlassian
//! GET    /auth/jira/callback               - Finish OAuth, start session
//! POST   /auth/logout                      - End session
//!
//! # Members (requires auth)
//! GET    /api/me                           - Current user + organization
//! PUT    /api/me/status                    - Presence heartbeat
//! GET    /api/team                         - Members with presence and today's check-in
//! POST   /api/checkins                     - Check in now
//! GET    /api/checkins/me                  - Today, streak, summary, history
//! GET    /api/issues?q=                    - Issue picker
//! GET    /api/worklogs?from=&to=           - Worklogs + daily summary
//! POST   /api/worklogs                     - Add worklog
//! DELETE /api/worklogs/{issue_key}/{id}    - Delete worklog
//!
//! # Admin (requires admin role)
//! GET    /api/admin/users                  - List members
//! POST   /api/admin/invitations            - Invite member
//! POST   /api/admin/users/{id}/invitation  - Reissue invitation
//! PATCH  /api/admin/users/{id}             - Update name / role
//! DELETE /api/admin/users/{id}             - Remove member
//! GET    /api/admin/organization           - Organization settings
//! PUT    /api/admin/organization           - Update settings
//! GET    /api/admin/stats?days=            - Dashboard statistics
//! ```

pub mod admin;
pub mod auth;
pub mod checkins;
pub mod issues;
pub mod me;
pub mod responses;
pub mod signup;
pub mod team;
pub mod worklogs;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::db::OrganizationRepository;
use crate::error::AppError;
use crate::models::{Organization, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Routes behind the auth rate limiter (`/auth/*` and `/api/signup`).
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .merge(signup::router())
}

/// JSON API routes for logged-in members and admins.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(me::router())
        .merge(team::router())
        .merge(checkins::router())
        .merge(issues::router())
        .merge(worklogs::router())
        .merge(admin::router())
}

/// Health check routes, never rate limited.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Load the organization of a logged-in user.
///
/// # Errors
///
/// Returns `AppError::Internal` if the organization row is missing.
pub(crate) async fn load_organization(state: &AppState, user: &User) -> Result<Organization, AppError> {
    OrganizationRepository::new(state.pool())
        .get_by_id(user.organization_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "organization {} of user {} not found",
                user.organization_id, user.id
            ))
        })
}

/// Get a usable Jira access token for the user, refreshing it when needed.
///
/// # Errors
///
/// Returns `AppError::Auth` when the user must log in again.
pub(crate) async fn jira_access_token(state: &AppState, user: &User) -> Result<String, AppError> {
    let token = AuthService::new(state.pool(), state.config().invitation_ttl_days)
        .valid_access_token(state.jira(), user)
        .await?;
    Ok(token)
}
