//! Check-in repository for database operations.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use worktally_core::{CheckInId, OrganizationId, Punctuality, UserId};

use super::RepositoryError;
use crate::models::CheckIn;

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct CheckInRow {
    id: i32,
    user_id: i32,
    organization_id: i32,
    local_date: NaiveDate,
    checked_in_at: DateTime<Utc>,
    punctuality: Punctuality,
}

impl From<CheckInRow> for CheckIn {
    fn from(row: CheckInRow) -> Self {
        Self {
            id: CheckInId::new(row.id),
            user_id: UserId::new(row.user_id),
            organization_id: OrganizationId::new(row.organization_id),
            local_date: row.local_date,
            checked_in_at: row.checked_in_at,
            punctuality: row.punctuality,
        }
    }
}

/// Repository for check-in database operations.
pub struct CheckInRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckInRepository<'a> {
    /// Create a new check-in repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a check-in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already checked in on `local_date`.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        local_date: NaiveDate,
        checked_in_at: DateTime<Utc>,
        punctuality: Punctuality,
    ) -> Result<CheckIn, RepositoryError> {
        let row = sqlx::query_as::<_, CheckInRow>(
            r"
            INSERT INTO worktally.checkin
                (user_id, organization_id, local_date, checked_in_at, punctuality)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, organization_id, local_date, checked_in_at, punctuality
            ",
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(local_date)
        .bind(checked_in_at)
        .bind(punctuality)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::on_unique("already checked in"))?;

        Ok(row.into())
    }

    /// Get a user's check-in for a local date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_date(
        &self,
        user_id: UserId,
        local_date: NaiveDate,
    ) -> Result<Option<CheckIn>, RepositoryError> {
        let row = sqlx::query_as::<_, CheckInRow>(
            r"
            SELECT id, user_id, organization_id, local_date, checked_in_at, punctuality
            FROM worktally.checkin
            WHERE user_id = $1 AND local_date = $2
            ",
        )
        .bind(user_id)
        .bind(local_date)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List a user's check-ins on or after a local date, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<CheckIn>, RepositoryError> {
        let rows = sqlx::query_as::<_, CheckInRow>(
            r"
            SELECT id, user_id, organization_id, local_date, checked_in_at, punctuality
            FROM worktally.checkin
            WHERE user_id = $1 AND local_date >= $2
            ORDER BY local_date DESC
            ",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List every check-in of an organization on a local date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_organization_on(
        &self,
        organization_id: OrganizationId,
        local_date: NaiveDate,
    ) -> Result<Vec<CheckIn>, RepositoryError> {
        let rows = sqlx::query_as::<_, CheckInRow>(
            r"
            SELECT id, user_id, organization_id, local_date, checked_in_at, punctuality
            FROM worktally.checkin
            WHERE organization_id = $1 AND local_date = $2
            ORDER BY checked_in_at
            ",
        )
        .bind(organization_id)
        .bind(local_date)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List every check-in of an organization on or after a local date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_organization_since(
        &self,
        organization_id: OrganizationId,
        since: NaiveDate,
    ) -> Result<Vec<CheckIn>, RepositoryError> {
        let rows = sqlx::query_as::<_, CheckInRow>(
            r"
            SELECT id, user_id, organization_id, local_date, checked_in_at, punctuality
            FROM worktally.checkin
            WHERE organization_id = $1 AND local_date >= $2
            ORDER BY local_date DESC, checked_in_at
            ",
        )
        .bind(organization_id)
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
