//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::jira::JiraError;
use crate::services::auth::AuthError;
use crate::services::checkin::CheckInError;
use crate::services::worklog::WorklogError;

const INTERNAL: &str = "Internal server error";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Jira API operation failed.
    #[error("Jira error: {0}")]
    Jira(#[from] JiraError),

    /// Signup, invitation or OAuth linking failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Check-in operation failed.
    #[error("Check-in error: {0}")]
    CheckIn(#[from] CheckInError),

    /// Worklog operation failed.
    #[error("Worklog error: {0}")]
    Worklog(#[from] WorklogError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and client-facing message.
    ///
    /// Internal details are never included for server errors.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_response(err),
            Self::Jira(err) => jira_response(err),
            Self::Auth(err) => auth_response(err),
            Self::CheckIn(err) => match err {
                CheckInError::AlreadyCheckedIn => (StatusCode::CONFLICT, err.to_string()),
                CheckInError::InvalidWindow | CheckInError::InvalidOffset(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CheckInError::Repository(e) => repository_response(e),
            },
            Self::Worklog(err) => match err {
                WorklogError::InvalidRange(_)
                | WorklogError::InvalidIssueKey(_)
                | WorklogError::InvalidDuration => (StatusCode::BAD_REQUEST, err.to_string()),
                WorklogError::NoJiraSite => (StatusCode::CONFLICT, err.to_string()),
                WorklogError::Clock(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
                WorklogError::Jira(e) => jira_response(e),
            },
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
        }
    }
}

fn repository_response(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn jira_response(err: &JiraError) -> (StatusCode, String) {
    match err {
        JiraError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            "Jira authorization expired, please log in again".to_string(),
        ),
        JiraError::Api { status: 404, .. } => (
            StatusCode::NOT_FOUND,
            "Not found in Jira".to_string(),
        ),
        JiraError::Api { status: 400, .. } => (
            StatusCode::BAD_REQUEST,
            "Jira rejected the request".to_string(),
        ),
        JiraError::Api { .. } | JiraError::Http(_) | JiraError::Parse(_) => (
            StatusCode::BAD_GATEWAY,
            "Jira request failed".to_string(),
        ),
    }
}

fn auth_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::InvalidInput(_) | AuthError::InvalidInvitation => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        AuthError::EmailTaken | AuthError::AccountAlreadyLinked | AuthError::NotPending => {
            (StatusCode::CONFLICT, err.to_string())
        }
        AuthError::NoAccount | AuthError::SiteMismatch | AuthError::NoAccessibleSite => {
            (StatusCode::FORBIDDEN, err.to_string())
        }
        AuthError::NotLinked | AuthError::JiraReauthRequired => {
            (StatusCode::UNAUTHORIZED, err.to_string())
        }
        AuthError::TokenExchange(e) | AuthError::Jira(e) => jira_response(e),
        AuthError::Repository(e) => repository_response(e),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
