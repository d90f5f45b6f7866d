//! Presence domain type.

use chrono::{DateTime, Utc};

use worktally_core::{PresenceStatus, UserId};

/// Last reported presence of a user, as stored.
///
/// Use `services::presence::effective_status` to read it, since stored
/// statuses go stale.
#[derive(Debug, Clone, Copy)]
pub struct OnlineStatus {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen_at: DateTime<Utc>,
}
