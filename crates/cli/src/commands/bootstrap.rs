//! Organization bootstrap command.
//!
//! # Usage
//!
//! ```bash
//! wt-cli bootstrap -o "Acme" -e admin@example.com -n "Admin Name"
//! ```
//!
//! Prints the signup link the admin follows to link their Jira account.

use worktally_server::services::AuthService;

use super::{CommandError, connect};

/// Create an organization with a pending admin and print the signup link.
///
/// # Errors
///
/// Returns an error for invalid input, a duplicate email or a database failure.
pub async fn run(organization: &str, email: &str, name: &str) -> Result<(), CommandError> {
    let (config, pool) = connect().await?;

    let issued = AuthService::new(&pool, config.invitation_ttl_days)
        .signup(organization, name, email)
        .await?;

    tracing::info!(
        organization_id = %issued.user.organization_id,
        user_id = %issued.user.id,
        "Organization created"
    );

    #[allow(clippy::print_stdout)]
    {
        println!();
        println!("Organization created. Send this signup link to {email}:");
        println!("  {}", config.invitation_link(&issued.token));
        println!("The link expires in {} days.", config.invitation_ttl_days);
    }

    Ok(())
}
