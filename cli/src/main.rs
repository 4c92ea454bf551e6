//! # Devyard Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! Devyard provisions local development infrastructure (networks, containers,
//! k3s clusters, Nomad clusters and ingress proxies) from a TOML stack file.
//! This file handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to the command handlers
//!
//! ## Examples
//!
//! ```bash
//! devyard validate -f stack.toml
//! devyard -v apply -f stack.toml --force-pull
//! devyard status -f stack.toml --json
//! devyard destroy -f stack.toml
//! ```
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod common;
mod core;
mod engine;
mod providers;
mod resources;

#[derive(Parser, Debug)]
#[command(
    name = "devyard",
    about = "Local development infrastructure from a declarative stack file",
    long_about = "Create, inspect and destroy networks, containers, k3s and Nomad clusters\n\
                  and ingress proxies declared in a TOML stack file.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Parser, Debug)]
enum Commands {
    #[command(alias = "up")]
    Apply(commands::apply::ApplyArgs),
    #[command(alias = "down")]
    Destroy(commands::destroy::DestroyArgs),
    Status(commands::status::StatusArgs),
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Apply(args) => commands::apply::handle_apply(args).await,
        Commands::Destroy(args) => commands::destroy::handle_destroy(args).await,
        Commands::Status(args) => commands::status::handle_status(args).await,
        Commands::Validate(args) => commands::validate::handle_validate(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        if let Some(hint) = crate::core::error::classify(&e).and_then(|err| err.hint()) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}
