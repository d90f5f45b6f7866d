//! Invitation commands.
//!
//! # Usage
//!
//! ```bash
//! wt-cli invitations reissue -e member@example.com
//! ```

use worktally_core::Email;
use worktally_server::db::UserRepository;
use worktally_server::services::AuthService;

use super::{CommandError, connect};

/// Rotate a pending member's invitation and print the new signup link.
///
/// # Errors
///
/// Returns an error if the user does not exist or is already active.
pub async fn reissue(email: &str) -> Result<(), CommandError> {
    let email = Email::parse(email)?;
    let (config, pool) = connect().await?;

    let user = UserRepository::new(&pool)
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CommandError::UserNotFound(email.to_string()))?;

    let issued = AuthService::new(&pool, config.invitation_ttl_days)
        .reissue_invitation(&user)
        .await?;

    tracing::info!(user_id = %issued.user.id, "Invitation reissued");

    #[allow(clippy::print_stdout)]
    {
        println!();
        println!("New signup link for {email}:");
        println!("  {}", config.invitation_link(&issued.token));
        println!("The link expires in {} days.", config.invitation_ttl_days);
    }

    Ok(())
}
