//! Hortifruti Delivery CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply migrations/ to DATABASE_URL
//! hrt-cli migrate
//!
//! # Create a staff account (or promote an existing customer)
//! hrt-cli admin create -e gerente@hortifrutidelivery.com.br -n "Gerente" -p 'senha-forte'
//!
//! # Demo categories, products and users
//! hrt-cli seed
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "hrt-cli")]
#[command(author, version, about = "Hortifruti Delivery CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Insert demo data (skips rows that already exist)
    Seed,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a staff account, or promote the user with this email
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (minimum 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
        },
        Commands::Seed => {
            commands::seed::run().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "hrt-cli",
            "admin",
            "create",
            "-e",
            "gerente@hortifrutidelivery.com.br",
            "-n",
            "Gerente",
            "-p",
            "senha-forte",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin {
                action: AdminAction::Create { .. }
            })
        ));
    }
}
