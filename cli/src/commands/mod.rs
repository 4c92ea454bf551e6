//! # Devyard Command Handlers
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! One module per subcommand, each exposing a `clap` args struct and an async
//! `handle_*` function called from `main.rs`:
//!
//! - `apply`: create every resource of a stack file, dependencies first.
//! - `destroy`: tear the stack down, dependents first.
//! - `status`: runtime ids of every declared resource.
//! - `validate`: parse and order the stack without touching Docker.
//!
//! `apply` and `destroy` stop between dependency levels on Ctrl-C.
//!
pub mod apply;
pub mod destroy;
pub mod status;
pub mod validate;

use crate::common::docker::DockerClient;
use crate::core::config::Settings;
use crate::core::error::Result;
use crate::engine::Engine;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Stack file selection shared by every subcommand.
#[derive(Args, Debug)]
pub struct StackArgs {
    /// Path to the TOML stack file.
    #[arg(short, long, default_value = "stack.toml", env = "DEVYARD_STACK")]
    pub file: PathBuf,
}

/// Builds an engine connected to the local Docker daemon.
pub(crate) fn docker_engine(settings: Settings) -> Result<Engine> {
    let client = DockerClient::connect()?;
    Ok(Engine::new(Arc::new(client), settings))
}

/// Returns a token cancelled on the first Ctrl-C. In-flight operations finish;
/// the engine stops before the next dependency level.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, waiting for in-flight operations to finish...");
            signal_token.cancel();
        }
    });
    token
}
