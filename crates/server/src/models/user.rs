//! User domain types.

use chrono::{DateTime, Utc};

use worktally_core::{Email, OrganizationId, UserId, UserRole, UserStatus};

/// A member of an organization.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Organization the user belongs to.
    pub organization_id: OrganizationId,
    /// User's email address (lowercase).
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role within the organization.
    pub role: UserRole,
    /// Pending until the Jira account is linked.
    pub status: UserStatus,
    /// When the outstanding invitation expires (pending users only).
    pub invitation_expires_at: Option<DateTime<Utc>>,
    /// Linked Atlassian account ID.
    pub jira_account_id: Option<String>,
    /// Stored Jira OAuth tokens.
    pub jira: Option<JiraCredentials>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Returns true if the user has not completed signup yet.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, UserStatus::Pending)
    }

    /// Returns true if the user can use the application.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, UserStatus::Active)
    }

    /// Returns true if the user holds the admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Returns true if the user is pending and the invitation has not expired.
    #[must_use]
    pub fn invitation_is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.invitation_expires_at.is_some_and(|expires| now < expires)
    }
}

/// Jira OAuth tokens persisted for a user.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone)]
pub struct JiraCredentials {
    /// Bearer token for the Jira REST API.
    pub access_token: String,
    /// Rotating refresh token (`offline_access` scope).
    pub refresh_token: Option<String>,
    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl JiraCredentials {
    /// Check if the access token is expired (with 60s buffer).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now >= expires_at - chrono::Duration::seconds(60))
    }
}

impl std::fmt::Debug for JiraCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraCredentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
