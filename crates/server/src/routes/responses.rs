//! JSON response bodies shared by several route modules.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use worktally_core::{Email, OrganizationId, UserId, UserRole, UserStatus};

use crate::models::{Organization, User};

/// A user as exposed by the API. Tokens are never included.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub jira_linked: bool,
    pub invitation_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            status: user.status,
            jira_linked: user.jira_account_id.is_some(),
            invitation_expires_at: user.invitation_expires_at,
            created_at: user.created_at,
        }
    }
}

/// Organization settings as exposed by the API.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationResponse {
    pub id: OrganizationId,
    pub name: String,
    pub jira_site_url: Option<String>,
    /// `HH:MM` in organization local time.
    pub checkin_start: String,
    pub checkin_end: String,
    pub utc_offset_minutes: i32,
}

impl From<&Organization> for OrganizationResponse {
    fn from(organization: &Organization) -> Self {
        Self {
            id: organization.id,
            name: organization.name.clone(),
            jira_site_url: organization.jira_site_url.clone(),
            checkin_start: format_time(organization.checkin_start),
            checkin_end: format_time(organization.checkin_end),
            utc_offset_minutes: organization.utc_offset_minutes,
        }
    }
}

/// A freshly issued invitation.
///
/// The link carries the plain token and is only shown once.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationResponse {
    pub user: UserResponse,
    pub invitation_link: String,
    pub invitation_expires_at: Option<DateTime<Utc>>,
    pub email_sent: bool,
}

/// Format a check-in window bound as `HH:MM`.
#[must_use]
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse a check-in window bound from `HH:MM` or `HH:MM:SS`.
#[must_use]
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}
