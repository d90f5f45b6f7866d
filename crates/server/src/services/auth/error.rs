//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::jira::JiraError;

/// Errors that can occur during signup, invitations and OAuth linking.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] worktally_core::EmailError),

    /// A name or other input failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// The email is already registered.
    #[error("email already registered")]
    EmailTaken,

    /// Invitation token unknown, expired or already used.
    #[error("invitation is invalid or has expired")]
    InvalidInvitation,

    /// The Jira account does not belong to an active user.
    #[error("no account is linked to this Jira user")]
    NoAccount,

    /// The Jira account cannot reach the organization's site.
    #[error("Jira account has no access to the organization's site")]
    SiteMismatch,

    /// The Jira account cannot reach any site.
    #[error("Jira account has no accessible sites")]
    NoAccessibleSite,

    /// The Jira account is already linked to another user.
    #[error("Jira account is already linked to another user")]
    AccountAlreadyLinked,

    /// The user has no stored Jira tokens.
    #[error("Jira account is not linked")]
    NotLinked,

    /// The user has already completed signup.
    #[error("user is not pending")]
    NotPending,

    /// The stored refresh token was rejected; the user must log in again.
    #[error("Jira authorization expired, please log in again")]
    JiraReauthRequired,

    /// Authorization code exchange failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(JiraError),

    /// Jira API error.
    #[error("Jira error: {0}")]
    Jira(#[from] JiraError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Error code appended to the login redirect after a failed OAuth flow.
    #[must_use]
    pub const fn redirect_code(&self) -> &'static str {
        match self {
            Self::InvalidInvitation | Self::NotPending => "invalid_invitation",
            Self::NoAccount => "no_account",
            Self::SiteMismatch | Self::NoAccessibleSite => "site_mismatch",
            Self::AccountAlreadyLinked => "account_linked",
            Self::TokenExchange(_) | Self::Jira(_) | Self::NotLinked | Self::JiraReauthRequired => {
                "token_exchange"
            }
            Self::InvalidEmail(_)
            | Self::InvalidInput(_)
            | Self::EmailTaken
            | Self::Repository(_) => "session",
        }
    }
}
