//! Check-in domain type.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use worktally_core::{CheckInId, OrganizationId, Punctuality, UserId};

/// One daily check-in.
#[derive(Debug, Clone, Serialize)]
pub struct CheckIn {
    pub id: CheckInId,
    pub user_id: UserId,
    #[serde(skip)]
    pub organization_id: OrganizationId,
    /// Date in the organization's local time.
    pub local_date: NaiveDate,
    pub checked_in_at: DateTime<Utc>,
    pub punctuality: Punctuality,
}
