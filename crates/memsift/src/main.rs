//! memsift - session-to-memory distillation CLI
//!
//! Thin collaborator over memsift-core: parses arguments, loads
//! configuration, renders structured pipeline results. All lifecycle
//! logic lives in the core crate.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("memsift=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Analyze { json } => commands::analyze::execute(json, &config).await,
        Commands::Review(cmd) => commands::review::execute(cmd, &config).await,
        Commands::Promote { json } => commands::promote::execute(json, &config).await,
        Commands::Housekeep { days } => commands::housekeep::execute(days, &config).await,
        Commands::Status => commands::status::execute(&config).await,
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Version => {
            println!("memsift {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
