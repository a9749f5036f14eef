//! mousestick
//!
//! Turns a mouse (plus optional head tracking) into a virtual flight joystick.

use anyhow::Result;
use clap::Parser;

use mousestick_core::Config;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, config_path).await,
        Commands::Devices => commands::devices(),
        Commands::Config { init, force } => commands::config(&config_path, init, force),
    }
}
