//! Presence repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use worktally_core::{OrganizationId, PresenceStatus, UserId};

use super::RepositoryError;
use crate::models::OnlineStatus;

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct OnlineStatusRow {
    user_id: i32,
    status: PresenceStatus,
    last_seen_at: DateTime<Utc>,
}

impl From<OnlineStatusRow> for OnlineStatus {
    fn from(row: OnlineStatusRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            status: row.status,
            last_seen_at: row.last_seen_at,
        }
    }
}

/// Repository for presence database operations.
pub struct PresenceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PresenceRepository<'a> {
    /// Create a new presence repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a user's presence.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        status: PresenceStatus,
        seen_at: DateTime<Utc>,
    ) -> Result<OnlineStatus, RepositoryError> {
        let row = sqlx::query_as::<_, OnlineStatusRow>(
            r"
            INSERT INTO worktally.online_status (user_id, status, last_seen_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET status = EXCLUDED.status, last_seen_at = EXCLUDED.last_seen_at
            RETURNING user_id, status, last_seen_at
            ",
        )
        .bind(user_id)
        .bind(status)
        .bind(seen_at)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// List the stored presence of every member of an organization.
    ///
    /// Members who never reported presence have no row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<OnlineStatus>, RepositoryError> {
        let rows = sqlx::query_as::<_, OnlineStatusRow>(
            r"
            SELECT s.user_id, s.status, s.last_seen_at
            FROM worktally.online_status s
            JOIN worktally.app_user u ON u.id = s.user_id
            WHERE u.organization_id = $1
            ",
        )
        .bind(organization_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
