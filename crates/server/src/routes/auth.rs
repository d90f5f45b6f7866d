//! Jira OAuth route handlers.
//!
//! Login and invitation signup both redirect to Atlassian; the callback
//! completes the flow and starts a session. Failures redirect to the
//! frontend's login page with an `error` code.

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::{self, AuthService};
use crate::state::AppState;

/// Build the auth router (mounted under `/auth`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jira/login", get(login))
        .route("/jira/signup", get(signup))
        .route("/jira/callback", get(callback))
        .route("/logout", post(logout))
}

/// Query parameters of the invitation link.
#[derive(Debug, Deserialize)]
pub struct SignupQuery {
    pub token: Option<String>,
}

/// Query parameters from the Atlassian OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

/// Redirect to the frontend login page with an error code.
fn login_error(state: &AppState, code: &str) -> Response {
    Redirect::to(&format!("{}/login?error={code}", state.config().app_url)).into_response()
}

/// Store a fresh OAuth state and redirect to Atlassian.
async fn redirect_to_atlassian(state: &AppState, session: &Session) -> Response {
    let oauth_state = auth::generate_oauth_state();

    if let Err(e) = session
        .insert(session_keys::JIRA_OAUTH_STATE, &oauth_state)
        .await
    {
        tracing::error!("Failed to store OAuth state in session: {}", e);
        return login_error(state, "session");
    }

    let auth_url = state
        .jira()
        .authorization_url(&state.config().jira_redirect_uri(), &oauth_state);

    Redirect::to(&auth_url).into_response()
}

/// Start Jira login for an existing member.
///
/// # Route
///
/// `GET /auth/jira/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(current): OptionalUser,
) -> Response {
    if current.is_some() {
        return Redirect::to(&state.config().app_url).into_response();
    }

    // A leftover invitation must not turn a login into a signup
    if let Err(e) = session.remove::<String>(session_keys::INVITATION_HASH).await {
        tracing::warn!("Failed to clear invitation from session: {}", e);
    }

    redirect_to_atlassian(&state, &session).await
}

/// Validate an invitation link and start Jira signup.
///
/// The session keeps the token's hash, never the token itself.
///
/// # Route
///
/// `GET /auth/jira/signup?token=…`
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SignupQuery>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return login_error(&state, "invalid_invitation");
    };

    let service = AuthService::new(state.pool(), state.config().invitation_ttl_days);
    let user = match service.find_invitation(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Invitation rejected: {}", e);
            return login_error(&state, e.redirect_code());
        }
    };

    if let Err(e) = session
        .insert(session_keys::INVITATION_HASH, auth::hash_invitation_token(&token))
        .await
    {
        tracing::error!("Failed to store invitation in session: {}", e);
        return login_error(&state, "session");
    }

    tracing::info!(user_id = %user.id, "Invitation accepted, redirecting to Atlassian");
    redirect_to_atlassian(&state, &session).await
}

/// Handle the Atlassian OAuth callback.
///
/// Validates the state parameter, links or logs in the user and starts the
/// session.
///
/// # Route
///
/// `GET /auth/jira/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    // Check for OAuth errors from Atlassian
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!("Jira OAuth error: {} - {}", error, description);
        return login_error(&state, "jira_denied");
    }

    let Some(code) = query.code else {
        tracing::warn!("Jira OAuth callback missing code");
        return login_error(&state, "missing_code");
    };

    // Verify state parameter (CSRF protection)
    let stored_state: Option<String> = session
        .remove(session_keys::JIRA_OAUTH_STATE)
        .await
        .ok()
        .flatten();

    if stored_state.is_none() || stored_state != query.state {
        tracing::warn!("Jira OAuth state mismatch");
        return login_error(&state, "invalid_state");
    }

    let invitation_hash: Option<String> = session
        .remove(session_keys::INVITATION_HASH)
        .await
        .ok()
        .flatten();

    let service = AuthService::new(state.pool(), state.config().invitation_ttl_days);
    let user = match service
        .complete_oauth(
            state.jira(),
            &code,
            &state.config().jira_redirect_uri(),
            invitation_hash.as_deref(),
        )
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Jira OAuth failed: {}", e);
            return login_error(&state, e.redirect_code());
        }
    };

    if let Err(e) = set_current_user(&session, &CurrentUser::from(&user)).await {
        tracing::error!("Failed to store user in session: {}", e);
        return login_error(&state, "session");
    }

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User logged in");

    Redirect::to(&state.config().app_url).into_response()
}

/// End the session.
///
/// # Route
///
/// `POST /auth/logout`
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {}", e);
        return crate::error::AppError::from(e).into_response();
    }

    clear_sentry_user();
    StatusCode::NO_CONTENT.into_response()
}
