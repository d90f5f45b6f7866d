//! Team presence.
//!
//! Clients send a heartbeat with their status while the app is open. A
//! stored status that has not been refreshed within
//! [`PRESENCE_TTL_SECONDS`] reads as offline.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use worktally_core::PresenceStatus;

use crate::db::{PresenceRepository, RepositoryError};
use crate::models::{OnlineStatus, User};

/// How long a heartbeat keeps a user online or away.
pub const PRESENCE_TTL_SECONDS: i64 = 5 * 60;

/// The status to show for a stored presence row.
#[must_use]
pub fn effective_status(stored: Option<&OnlineStatus>, now: DateTime<Utc>) -> PresenceStatus {
    let ttl = Duration::seconds(PRESENCE_TTL_SECONDS);
    match stored {
        Some(presence) if now - presence.last_seen_at <= ttl => presence.status,
        _ => PresenceStatus::Offline,
    }
}

/// Presence service.
pub struct PresenceService<'a> {
    presence: PresenceRepository<'a>,
}

impl<'a> PresenceService<'a> {
    /// Create a new presence service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            presence: PresenceRepository::new(pool),
        }
    }

    /// Record a heartbeat.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn heartbeat(
        &self,
        user: &User,
        status: PresenceStatus,
        now: DateTime<Utc>,
    ) -> Result<OnlineStatus, RepositoryError> {
        let presence = self.presence.upsert(user.id, status, now).await?;
        tracing::debug!(user_id = %user.id, status = %status, "Presence updated");
        Ok(presence)
    }
}

#[cfg(test)]
mod tests {
    use worktally_core::UserId;

    use super::*;

    fn stored(status: PresenceStatus, seconds_ago: i64, now: DateTime<Utc>) -> OnlineStatus {
        OnlineStatus {
            user_id: UserId::new(1),
            status,
            last_seen_at: now - Duration::seconds(seconds_ago),
        }
    }

    #[test]
    fn test_recent_status_is_kept() {
        let now = Utc::now();
        let away = stored(PresenceStatus::Away, 30, now);
        assert_eq!(effective_status(Some(&away), now), PresenceStatus::Away);

        let online = stored(PresenceStatus::Online, 300, now);
        assert_eq!(effective_status(Some(&online), now), PresenceStatus::Online);
    }

    #[test]
    fn test_stale_status_reads_offline() {
        let now = Utc::now();
        let online = stored(PresenceStatus::Online, 301, now);
        assert_eq!(effective_status(Some(&online), now), PresenceStatus::Offline);
    }

    #[test]
    fn test_missing_status_reads_offline() {
        assert_eq!(effective_status(None, Utc::now()), PresenceStatus::Offline);
    }
}
