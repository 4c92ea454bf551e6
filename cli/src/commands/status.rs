//! # Devyard Status Handler
//!
//! File: cli/src/commands/status.rs
//!
//! Looks up the runtime ids of every declared resource. A resource with no ids
//! does not exist in the runtime; that is reported, not treated as an error.
//! `--json` also carries each resource's kind and declared configuration.
//!
use super::{docker_engine, StackArgs};
use crate::core::{config, error::Result};
use crate::engine::ResourceState;
use crate::resources::loader;
use anyhow::Context;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Show which declared resources exist in the runtime")]
pub struct StatusArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_status(args: StatusArgs) -> Result<()> {
    info!("Handling status command (file: {})", args.stack.file.display());

    let settings = config::load_settings().context("Failed to load devyard settings")?;
    let graph = loader::load_stack(&args.stack.file)?;
    let states = docker_engine(settings)?.lookup(&graph).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&states).context("Failed to serialize status")?;
        println!("{}", json);
    } else {
        for state in &states {
            println!("{}", format_state(state));
        }
    }
    Ok(())
}

fn format_state(state: &ResourceState) -> String {
    if state.ids.is_empty() {
        return format!("{:<40} absent", state.reference);
    }
    let ids: Vec<&str> = state
        .ids
        .iter()
        .map(|id| id.get(..12).unwrap_or(id))
        .collect();
    format!("{:<40} present  {}", state.reference, ids.join(", "))
}
