//! Leadflow CLI - Database migrations and seed data.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! leadflow-cli migrate
//!
//! # Seed a demo user with a purchase and a few leads
//! leadflow-cli seed
//!
//! # Seed under a specific email
//! leadflow-cli seed -e demo@example.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the database with demo data

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "leadflow-cli")]
#[command(author, version, about = "Leadflow CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with a demo user, purchase, and leads
    Seed {
        /// Email address for the demo user
        #[arg(short, long, default_value = "demo@leadflow.app")]
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
        Commands::Seed { email } => commands::seed::run(&email).await?,
    }
    Ok(())
}
