//! Worktally CLI - Database migrations and bootstrap tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (including the session store)
//! wt-cli migrate
//!
//! # Create an organization and its first admin
//! wt-cli bootstrap -o "Acme" -e admin@example.com -n "Admin Name"
//!
//! # Issue a fresh signup link to a pending member
//! wt-cli invitations reissue -e member@example.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `bootstrap` - Create an organization with a pending admin
//! - `invitations reissue` - Rotate a pending member's invitation

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "wt-cli")]
#[command(author, version, about = "Worktally CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create an organization and its first admin
    Bootstrap {
        /// Organization name
        #[arg(short, long)]
        organization: String,

        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,
    },
    /// Manage invitations
    Invitations {
        #[command(subcommand)]
        action: InvitationAction,
    },
}

#[derive(Subcommand)]
enum InvitationAction {
    /// Issue a new signup link to a pending member
    Reissue {
        /// Member email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Bootstrap {
            organization,
            email,
            name,
        } => {
            commands::bootstrap::run(&organization, &email, &name).await?;
        }
        Commands::Invitations { action } => match action {
            InvitationAction::Reissue { email } => {
                commands::invitations::reissue(&email).await?;
            }
        },
    }
    Ok(())
}
