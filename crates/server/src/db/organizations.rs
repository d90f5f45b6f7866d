//! Organization repository for database operations.

use chrono::{DateTime, NaiveTime, Utc};
use sqlx::{PgConnection, PgPool};

use worktally_core::OrganizationId;

use super::RepositoryError;
use crate::models::Organization;

/// Editable organization settings.
#[derive(Debug, Clone)]
pub struct OrganizationSettings {
    pub name: String,
    pub checkin_start: NaiveTime,
    pub checkin_end: NaiveTime,
    pub utc_offset_minutes: i32,
}

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct OrganizationRow {
    id: i32,
    name: String,
    jira_cloud_id: Option<String>,
    jira_site_url: Option<String>,
    checkin_start: NaiveTime,
    checkin_end: NaiveTime,
    utc_offset_minutes: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Self {
            id: OrganizationId::new(row.id),
            name: row.name,
            jira_cloud_id: row.jira_cloud_id,
            jira_site_url: row.jira_site_url,
            checkin_start: row.checkin_start,
            checkin_end: row.checkin_end,
            utc_offset_minutes: row.utc_offset_minutes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for organization database operations.
pub struct OrganizationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrganizationRepository<'a> {
    /// Create a new organization repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        settings: &OrganizationSettings,
    ) -> Result<Organization, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::create_in(&mut conn, settings).await
    }

    /// Create an organization on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_in(
        conn: &mut PgConnection,
        settings: &OrganizationSettings,
    ) -> Result<Organization, RepositoryError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r"
            INSERT INTO worktally.organization
                (name, checkin_start, checkin_end, utc_offset_minutes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, jira_cloud_id, jira_site_url, checkin_start,
                      checkin_end, utc_offset_minutes, created_at, updated_at
            ",
        )
        .bind(&settings.name)
        .bind(settings.checkin_start)
        .bind(settings.checkin_end)
        .bind(settings.utc_offset_minutes)
        .fetch_one(conn)
        .await?;

        Ok(row.into())
    }

    /// Get an organization by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Organization>, RepositoryError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r"
            SELECT id, name, jira_cloud_id, jira_site_url, checkin_start,
                   checkin_end, utc_offset_minutes, created_at, updated_at
            FROM worktally.organization
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List all organizations by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Organization>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrganizationRow>(
            r"
            SELECT id, name, jira_cloud_id, jira_site_url, checkin_start,
                   checkin_end, utc_offset_minutes, created_at, updated_at
            FROM worktally.organization
            ORDER BY name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Update name, check-in window and UTC offset.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_settings(
        &self,
        id: OrganizationId,
        settings: &OrganizationSettings,
    ) -> Result<Organization, RepositoryError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r"
            UPDATE worktally.organization
            SET name = $2, checkin_start = $3, checkin_end = $4,
                utc_offset_minutes = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, jira_cloud_id, jira_site_url, checkin_start,
                      checkin_end, utc_offset_minutes, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&settings.name)
        .bind(settings.checkin_start)
        .bind(settings.checkin_end)
        .bind(settings.utc_offset_minutes)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Link the organization to a Jira site.
    ///
    /// Only sets the site if none is linked yet, so concurrent signups cannot
    /// overwrite each other. Returns the organization as stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn link_jira_site(
        &self,
        id: OrganizationId,
        cloud_id: &str,
        site_url: &str,
    ) -> Result<Organization, RepositoryError> {
        sqlx::query(
            r"
            UPDATE worktally.organization
            SET jira_cloud_id = $2, jira_site_url = $3, updated_at = NOW()
            WHERE id = $1 AND jira_cloud_id IS NULL
            ",
        )
        .bind(id)
        .bind(cloud_id)
        .bind(site_url)
        .execute(self.pool)
        .await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}
