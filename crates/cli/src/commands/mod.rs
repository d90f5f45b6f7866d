//! CLI command implementations.

pub mod bootstrap;
pub mod invitations;
pub mod migrate;

use sqlx::PgPool;
use thiserror::Error;

use worktally_server::config::{ConfigError, ServerConfig};
use worktally_server::db::RepositoryError;
use worktally_server::services::AuthError;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Signup or invitation failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] worktally_core::EmailError),

    /// No user with the given email.
    #[error("No user with email: {0}")]
    UserNotFound(String),
}

/// Load the server configuration and connect to its database.
async fn connect() -> Result<(ServerConfig, PgPool), CommandError> {
    let config = ServerConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = worktally_server::db::create_pool(&config.database_url).await?;

    Ok((config, pool))
}
