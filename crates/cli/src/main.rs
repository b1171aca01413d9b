//! KEC CLI - Database migrations and staff tooling.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! kec-cli migrate
//!
//! # Move an order along the fulfilment path
//! kec-cli order set-status 42 shipped
//!
//! # Order counts and paid revenue per status
//! kec-cli report
//!
//! # Create a storefront account
//! kec-cli user create -e asha@example.com -p 'long-password'
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use kec_core::{OrderId, OrderStatus};

mod commands;

#[derive(Parser)]
#[command(name = "kec-cli")]
#[command(author, version, about = "KEC store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Print order counts and paid revenue per status
    Report,
    /// Manage storefront accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Change an order's fulfilment status
    SetStatus {
        /// Order ID
        id: OrderId,

        /// New status (`processing`, `shipped`, `completed`, `cancelled`)
        status: OrderStatus,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Order { action } => match action {
            OrderAction::SetStatus { id, status } => {
                commands::orders::set_status(id, status).await?;
            }
        },
        Commands::Report => commands::orders::report().await?,
        Commands::User { action } => match action {
            UserAction::Create { email, password } => {
                commands::users::create(&email, &password).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_set_status() {
        let cli = Cli::try_parse_from(["kec-cli", "order", "set-status", "42", "Shipped"]).unwrap();
        let Commands::Order {
            action: OrderAction::SetStatus { id, status },
        } = cli.command
        else {
            panic!("expected order set-status");
        };
        assert_eq!(id, OrderId::new(42));
        assert_eq!(status, OrderStatus::Shipped);
    }

    #[test]
    fn test_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["kec-cli", "order", "set-status", "42", "lost"]).is_err());
    }
}
