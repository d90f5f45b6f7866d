//! User repository for database operations.
//!
//! Users start as pending rows holding a hashed invitation token and become
//! active once a Jira account is linked.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use worktally_core::{Email, OrganizationId, UserId, UserRole, UserStatus};

use super::RepositoryError;

/// `Conflict` message when a change would leave an organization without an admin.
pub const LAST_ADMIN: &str = "An organization needs at least one admin";
use crate::models::{JiraCredentials, User};

/// Data needed to create a pending user.
#[derive(Debug, Clone)]
pub struct NewPendingUser<'a> {
    pub organization_id: OrganizationId,
    pub email: &'a Email,
    pub name: &'a str,
    pub role: UserRole,
    pub invitation_token_hash: &'a str,
    pub invitation_expires_at: DateTime<Utc>,
}

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    organization_id: i32,
    email: String,
    name: String,
    role: UserRole,
    status: UserStatus,
    invitation_expires_at: Option<DateTime<Utc>>,
    jira_account_id: Option<String>,
    jira_access_token: Option<String>,
    jira_refresh_token: Option<String>,
    jira_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let jira = row.jira_access_token.map(|access_token| JiraCredentials {
            access_token,
            refresh_token: row.jira_refresh_token,
            expires_at: row.jira_token_expires_at,
        });

        Ok(Self {
            id: UserId::new(row.id),
            organization_id: OrganizationId::new(row.organization_id),
            email,
            name: row.name,
            role: row.role,
            status: row.status,
            invitation_expires_at: row.invitation_expires_at,
            jira_account_id: row.jira_account_id,
            jira,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending user holding an invitation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_pending(&self, new: &NewPendingUser<'_>) -> Result<User, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::create_pending_in(&mut conn, new).await
    }

    /// Create a pending user on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_pending_in(
        conn: &mut PgConnection,
        new: &NewPendingUser<'_>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO worktally.app_user
                (organization_id, email, name, role, status,
                 invitation_token_hash, invitation_expires_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id, organization_id, email, name, role, status,
                      invitation_expires_at, jira_account_id, jira_access_token,
                      jira_refresh_token, jira_token_expires_at, created_at, updated_at
            ",
        )
        .bind(new.organization_id)
        .bind(new.email)
        .bind(new.name)
        .bind(new.role)
        .bind(new.invitation_token_hash)
        .bind(new.invitation_expires_at)
        .fetch_one(conn)
        .await
        .map_err(RepositoryError::on_unique("email already exists"))?;

        row.try_into()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, organization_id, email, name, role, status,
                   invitation_expires_at, jira_account_id, jira_access_token,
                   jira_refresh_token, jira_token_expires_at, created_at, updated_at
            FROM worktally.app_user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, organization_id, email, name, role, status,
                   invitation_expires_at, jira_account_id, jira_access_token,
                   jira_refresh_token, jira_token_expires_at, created_at, updated_at
            FROM worktally.app_user
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get the user linked to an Atlassian account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_jira_account(
        &self,
        account_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, organization_id, email, name, role, status,
                   invitation_expires_at, jira_account_id, jira_access_token,
                   jira_refresh_token, jira_token_expires_at, created_at, updated_at
            FROM worktally.app_user
            WHERE jira_account_id = $1
            ",
        )
        .bind(account_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get the pending user holding an invitation token hash.
    ///
    /// Expiry is not checked here; see `User::invitation_is_valid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_pending_by_invitation(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, organization_id, email, name, role, status,
                   invitation_expires_at, jira_account_id, jira_access_token,
                   jira_refresh_token, jira_token_expires_at, created_at, updated_at
            FROM worktally.app_user
            WHERE invitation_token_hash = $1 AND status = 'pending'
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List the members of an organization, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, organization_id, email, name, role, status,
                   invitation_expires_at, jira_account_id, jira_access_token,
                   jira_refresh_token, jira_token_expires_at, created_at, updated_at
            FROM worktally.app_user
            WHERE organization_id = $1
            ORDER BY lower(name), id
            ",
        )
        .bind(organization_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Activate a pending user with a linked Jira account.
    ///
    /// Clears the invitation so the token cannot be used twice.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the Jira account is linked to another user.
    /// Returns `RepositoryError::NotFound` if the user is no longer pending.
    pub async fn activate_with_jira(
        &self,
        id: UserId,
        account_id: &str,
        credentials: &JiraCredentials,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE worktally.app_user
            SET status = 'active', jira_account_id = $2, jira_access_token = $3,
                jira_refresh_token = $4, jira_token_expires_at = $5,
                invitation_token_hash = NULL, invitation_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING id, organization_id, email, name, role, status,
                      invitation_expires_at, jira_account_id, jira_access_token,
                      jira_refresh_token, jira_token_expires_at, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(account_id)
        .bind(&credentials.access_token)
        .bind(credentials.refresh_token.as_deref())
        .bind(credentials.expires_at)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::on_unique("jira account already linked"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Replace a user's stored Jira tokens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_jira_tokens(
        &self,
        id: UserId,
        credentials: &JiraCredentials,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE worktally.app_user
            SET jira_access_token = $2, jira_refresh_token = $3,
                jira_token_expires_at = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&credentials.access_token)
        .bind(credentials.refresh_token.as_deref())
        .bind(credentials.expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Rotate the invitation token of a pending user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user is not pending.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn reset_invitation(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE worktally.app_user
            SET invitation_token_hash = $2, invitation_expires_at = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING id, organization_id, email, name, role, status,
                      invitation_expires_at, jira_account_id, jira_access_token,
                      jira_refresh_token, jira_token_expires_at, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Update a user's display name and role.
    ///
    /// Runs under a lock on the organization row, so concurrent demotions
    /// cannot leave the organization without an admin.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user is not in the organization.
    /// Returns `RepositoryError::Conflict` if the last admin would be demoted.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_profile(
        &self,
        organization_id: OrganizationId,
        id: UserId,
        name: &str,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::check_admin_change(&mut tx, organization_id, id, Some(role)).await?;

        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE worktally.app_user
            SET name = $3, role = $4, updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING id, organization_id, email, name, role, status,
                      invitation_expires_at, jira_account_id, jira_access_token,
                      jira_refresh_token, jira_token_expires_at, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(organization_id)
        .bind(name)
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Delete a user along with their check-ins and presence.
    ///
    /// Shares the organization lock with [`Self::update_profile`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user is not in the organization.
    /// Returns `RepositoryError::Conflict` if the user is the last admin.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(
        &self,
        organization_id: OrganizationId,
        id: UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::check_admin_change(&mut tx, organization_id, id, None).await?;

        sqlx::query("DELETE FROM worktally.app_user WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lock the organization and make sure changing `id` to `next` (or
    /// removing it when `None`) leaves an admin behind.
    async fn check_admin_change(
        conn: &mut PgConnection,
        organization_id: OrganizationId,
        id: UserId,
        next: Option<UserRole>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("SELECT id FROM worktally.organization WHERE id = $1 FOR UPDATE")
            .bind(organization_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let current = sqlx::query_scalar::<_, UserRole>(
            "SELECT role FROM worktally.app_user WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let admins = Self::count_admins_in(conn, organization_id).await?;
        if keeps_an_admin(current, next, admins) {
            Ok(())
        } else {
            Err(RepositoryError::Conflict(LAST_ADMIN.to_string()))
        }
    }

    /// Count the admins of an organization, pending ones included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_admins(&self, organization_id: OrganizationId) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::count_admins_in(&mut conn, organization_id).await
    }

    async fn count_admins_in(
        conn: &mut PgConnection,
        organization_id: OrganizationId,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM worktally.app_user
            WHERE organization_id = $1 AND role = 'admin'
            ",
        )
        .bind(organization_id)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }
}

/// Whether changing a user from `current` to `next` (`None` removes them)
/// leaves at least one of `admin_count` admins.
#[must_use]
pub const fn keeps_an_admin(current: UserRole, next: Option<UserRole>, admin_count: i64) -> bool {
    !matches!(current, UserRole::Admin) || matches!(next, Some(UserRole::Admin)) || admin_count > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_an_admin() {
        // Members can always be changed or removed.
        assert!(keeps_an_admin(UserRole::Member, None, 1));
        assert!(keeps_an_admin(UserRole::Member, Some(UserRole::Admin), 0));

        // An admin staying admin is fine even when alone.
        assert!(keeps_an_admin(UserRole::Admin, Some(UserRole::Admin), 1));

        // Demoting or removing needs another admin.
        assert!(!keeps_an_admin(UserRole::Admin, Some(UserRole::Member), 1));
        assert!(!keeps_an_admin(UserRole::Admin, None, 1));
        assert!(keeps_an_admin(UserRole::Admin, Some(UserRole::Member), 2));
        assert!(keeps_an_admin(UserRole::Admin, None, 2));
    }
}
