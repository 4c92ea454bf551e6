//! # Devyard Apply Handler
//!
//! File: cli/src/commands/apply.rs
//!
//! `devyard apply -f stack.toml` loads settings and the stack, then creates
//! every resource level by level. A per-resource status summary is printed
//! whether or not the run succeeds, so a failed apply shows what was left
//! behind for a later `destroy`.
//!
use super::{cancel_on_ctrl_c, docker_engine, StackArgs};
use crate::core::{config, error::Result};
use crate::engine::Graph;
use crate::resources::loader;
use anyhow::Context;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Create every resource declared in a stack file")]
pub struct ApplyArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Pull images even when they are present locally.
    #[arg(long)]
    pub force_pull: bool,
}

pub async fn handle_apply(args: ApplyArgs) -> Result<()> {
    info!("Handling apply command (file: {})", args.stack.file.display());

    let mut settings = config::load_settings().context("Failed to load devyard settings")?;
    settings.force_pull |= args.force_pull;

    let mut graph = loader::load_stack(&args.stack.file)?;
    let engine = docker_engine(settings)?;
    let result = engine.apply(&mut graph, &cancel_on_ctrl_c()).await;

    print_summary(&graph);
    result
}

fn print_summary(graph: &Graph) {
    println!("\n--- Resources ---");
    for (_, resource) in graph.declared() {
        println!("{:<40} {}", resource.reference(), resource.info.status());
    }
}
