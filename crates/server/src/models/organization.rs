//! Organization domain type.

use chrono::{DateTime, NaiveTime, Utc};

use worktally_core::OrganizationId;

/// A tenant: one team sharing a Jira site and a check-in window.
#[derive(Debug, Clone)]
pub struct Organization {
    /// Unique organization ID.
    pub id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Atlassian cloud ID of the linked Jira site.
    pub jira_cloud_id: Option<String>,
    /// Base URL of the linked Jira site.
    pub jira_site_url: Option<String>,
    /// Local time the check-in window opens.
    pub checkin_start: NaiveTime,
    /// Local time the check-in window closes (inclusive).
    pub checkin_end: NaiveTime,
    /// Offset of the organization's local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// When the organization was created.
    pub created_at: DateTime<Utc>,
    /// When the organization was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Returns true once a Jira site has been linked.
    #[must_use]
    pub const fn has_jira_site(&self) -> bool {
        self.jira_cloud_id.is_some()
    }
}
