//! Authentication service.
//!
//! Covers organization signup, member invitations and linking a Jira account
//! through Atlassian OAuth. A pending user row holding a hashed invitation
//! token stands in for the account until the OAuth flow completes.

mod error;

pub use error::AuthError;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use worktally_core::{Email, UserRole};

use crate::db::organizations::OrganizationSettings;
use crate::db::users::NewPendingUser;
use crate::db::{OrganizationRepository, RepositoryError, UserRepository};
use crate::jira::{JiraClient, JiraError};
use crate::models::{Organization, User};

/// Maximum length of user and organization names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Default check-in window for new organizations.
const DEFAULT_CHECKIN_START: (u32, u32) = (9, 0);
const DEFAULT_CHECKIN_END: (u32, u32) = (9, 15);

/// Generate the random `state` parameter for an OAuth redirect.
#[must_use]
pub fn generate_oauth_state() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Generate a new invitation token (32 random bytes, URL-safe base64).
#[must_use]
pub fn generate_invitation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash an invitation token for storage and lookup.
#[must_use]
pub fn hash_invitation_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Trim a display name and check its length.
///
/// # Errors
///
/// Returns `AuthError::InvalidInput` if the name is empty or too long.
pub fn validate_name(field: &str, value: &str) -> Result<String, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidInput(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "{field} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// A pending user together with the plain invitation token.
///
/// The token is only ever held in memory; the database stores its hash.
#[derive(Debug)]
pub struct IssuedInvitation {
    pub user: User,
    pub token: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    invitation_ttl: Duration,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(pool: &'a PgPool, invitation_ttl_days: i64) -> Self {
        Self {
            pool,
            invitation_ttl: Duration::days(invitation_ttl_days),
        }
    }

    fn new_invitation(&self, now: DateTime<Utc>) -> (String, String, DateTime<Utc>) {
        let token = generate_invitation_token();
        let hash = hash_invitation_token(&token);
        (token, hash, now + self.invitation_ttl)
    }

    // =========================================================================
    // Signup and invitations
    // =========================================================================

    /// Create an organization and its first admin, pending until Jira is linked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput`/`InvalidEmail` for bad input.
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    #[instrument(skip(self, email), fields(organization = %organization_name))]
    pub async fn signup(
        &self,
        organization_name: &str,
        name: &str,
        email: &str,
    ) -> Result<IssuedInvitation, AuthError> {
        let organization_name = validate_name("organization name", organization_name)?;
        let name = validate_name("name", name)?;
        let email = Email::parse(email)?;

        let settings = OrganizationSettings {
            name: organization_name,
            checkin_start: default_time(DEFAULT_CHECKIN_START),
            checkin_end: default_time(DEFAULT_CHECKIN_END),
            utc_offset_minutes: 0,
        };
        let (token, hash, expires_at) = self.new_invitation(Utc::now());

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let organization = OrganizationRepository::create_in(&mut *tx, &settings).await?;
        let user = UserRepository::create_pending_in(
            &mut *tx,
            &NewPendingUser {
                organization_id: organization.id,
                email: &email,
                name: &name,
                role: UserRole::Admin,
                invitation_token_hash: &hash,
                invitation_expires_at: expires_at,
            },
        )
        .await
        .map_err(map_email_conflict)?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            organization_id = %organization.id,
            user_id = %user.id,
            "Organization created"
        );

        Ok(IssuedInvitation { user, token })
    }

    /// Invite a member to an existing organization.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput`/`InvalidEmail` for bad input.
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    #[instrument(skip(self, organization, email), fields(organization_id = %organization.id))]
    pub async fn invite(
        &self,
        organization: &Organization,
        email: &str,
        name: &str,
        role: UserRole,
    ) -> Result<IssuedInvitation, AuthError> {
        let name = validate_name("name", name)?;
        let email = Email::parse(email)?;
        let (token, hash, expires_at) = self.new_invitation(Utc::now());

        let user = UserRepository::new(self.pool)
            .create_pending(&NewPendingUser {
                organization_id: organization.id,
                email: &email,
                name: &name,
                role,
                invitation_token_hash: &hash,
                invitation_expires_at: expires_at,
            })
            .await
            .map_err(map_email_conflict)?;

        info!(user_id = %user.id, role = %role, "Member invited");
        Ok(IssuedInvitation { user, token })
    }

    /// Rotate the invitation token and expiry of a pending user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotPending` if the user already completed signup.
    pub async fn reissue_invitation(&self, user: &User) -> Result<IssuedInvitation, AuthError> {
        if !user.is_pending() {
            return Err(AuthError::NotPending);
        }

        let (token, hash, expires_at) = self.new_invitation(Utc::now());
        let user = UserRepository::new(self.pool)
            .reset_invitation(user.id, &hash, expires_at)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::NotPending,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "Invitation reissued");
        Ok(IssuedInvitation { user, token })
    }

    /// Look up the pending user an invitation token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInvitation` if the token is unknown or expired.
    pub async fn find_invitation(&self, token: &str) -> Result<User, AuthError> {
        self.pending_user_by_hash(&hash_invitation_token(token))
            .await
    }

    async fn pending_user_by_hash(&self, hash: &str) -> Result<User, AuthError> {
        UserRepository::new(self.pool)
            .get_pending_by_invitation(hash)
            .await?
            .filter(|user| user.invitation_is_valid(Utc::now()))
            .ok_or(AuthError::InvalidInvitation)
    }

    // =========================================================================
    // OAuth linking
    // =========================================================================

    /// Finish the OAuth flow and return the user to log in.
    ///
    /// With an invitation hash the pending user is activated and linked to
    /// the Jira account; the organization adopts the first accessible site
    /// if it has none yet. Without one, the Jira account must already belong
    /// to an active user, whose stored tokens are replaced.
    ///
    /// # Errors
    ///
    /// See [`AuthError::redirect_code`] for how each failure is reported.
    #[instrument(skip_all, fields(with_invitation = invitation_hash.is_some()))]
    pub async fn complete_oauth(
        &self,
        jira: &JiraClient,
        code: &str,
        redirect_uri: &str,
        invitation_hash: Option<&str>,
    ) -> Result<User, AuthError> {
        let token = jira
            .exchange_code(code, redirect_uri)
            .await
            .map_err(AuthError::TokenExchange)?;
        let account = jira.current_account(&token.access_token).await?;
        let sites = jira.accessible_resources(&token.access_token).await?;
        let credentials = token.into_credentials(None);
        let users = UserRepository::new(self.pool);

        let Some(hash) = invitation_hash else {
            let user = users
                .get_by_jira_account(&account.account_id)
                .await?
                .filter(User::is_active)
                .ok_or(AuthError::NoAccount)?;
            users.update_jira_tokens(user.id, &credentials).await?;

            info!(user_id = %user.id, "User logged in with Jira");
            return Ok(user);
        };

        let pending = self.pending_user_by_hash(hash).await?;

        if let Some(existing) = users.get_by_jira_account(&account.account_id).await?
            && existing.id != pending.id
        {
            return Err(AuthError::AccountAlreadyLinked);
        }

        let organizations = OrganizationRepository::new(self.pool);
        let organization = organizations
            .get_by_id(pending.organization_id)
            .await?
            .ok_or(AuthError::InvalidInvitation)?;

        match organization.jira_cloud_id.as_deref() {
            None => {
                let site = sites.first().ok_or(AuthError::NoAccessibleSite)?;
                let linked = organizations
                    .link_jira_site(organization.id, &site.id, &site.url)
                    .await?;
                // Another signup may have linked a different site first.
                if !sites
                    .iter()
                    .any(|s| Some(s.id.as_str()) == linked.jira_cloud_id.as_deref())
                {
                    return Err(AuthError::SiteMismatch);
                }
                info!(organization_id = %organization.id, site = %site.url, "Jira site linked");
            }
            Some(cloud_id) => {
                if !sites.iter().any(|s| s.id == cloud_id) {
                    return Err(AuthError::SiteMismatch);
                }
            }
        }

        if let Some(jira_email) = account.email.as_deref()
            && !jira_email.eq_ignore_ascii_case(pending.email.as_str())
        {
            warn!(
                user_id = %pending.id,
                "Invitation email differs from the Jira account email"
            );
        }

        let user = users
            .activate_with_jira(pending.id, &account.account_id, &credentials)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::AccountAlreadyLinked,
                RepositoryError::NotFound => AuthError::InvalidInvitation,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User activated with Jira");
        Ok(user)
    }

    /// Return a usable Jira access token for the user, refreshing it if needed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotLinked` if no usable tokens are stored.
    /// Returns `AuthError::JiraReauthRequired` if Jira rejects the refresh token.
    pub async fn valid_access_token(
        &self,
        jira: &JiraClient,
        user: &User,
    ) -> Result<String, AuthError> {
        let credentials = user.jira.as_ref().ok_or(AuthError::NotLinked)?;
        if !credentials.is_expired(Utc::now()) {
            return Ok(credentials.access_token.clone());
        }

        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or(AuthError::NotLinked)?;

        let token = jira.refresh_token(refresh_token).await.map_err(|e| match e {
            JiraError::Unauthorized => AuthError::JiraReauthRequired,
            JiraError::Api { status, .. } if (400..500).contains(&status) => {
                AuthError::JiraReauthRequired
            }
            other => AuthError::Jira(other),
        })?;

        let refreshed = token.into_credentials(credentials.refresh_token.clone());
        UserRepository::new(self.pool)
            .update_jira_tokens(user.id, &refreshed)
            .await?;

        tracing::debug!(user_id = %user.id, "Jira access token refreshed");
        Ok(refreshed.access_token)
    }
}

fn default_time((hour, minute): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn map_email_conflict(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(_) => AuthError::EmailTaken,
        other => AuthError::Repository(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_state_is_alphanumeric() {
        let state = generate_oauth_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(state, generate_oauth_state());
    }

    #[test]
    fn test_invitation_token_shape() {
        let token = generate_invitation_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_invitation_token());
    }

    #[test]
    fn test_hash_invitation_token() {
        let hash = hash_invitation_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash, hash_invitation_token("abd"));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Ada  ").ok().as_deref(), Some("Ada"));
        assert!(matches!(
            validate_name("name", "   "),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(validate_name("name", &"x".repeat(MAX_NAME_LENGTH)).is_ok());
        assert!(validate_name("name", &"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_default_window() {
        assert_eq!(default_time(DEFAULT_CHECKIN_START).to_string(), "09:00:00");
        assert_eq!(default_time(DEFAULT_CHECKIN_END).to_string(), "09:15:00");
    }
}
