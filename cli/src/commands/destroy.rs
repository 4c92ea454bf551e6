//! # Devyard Destroy Handler
//!
//! File: cli/src/commands/destroy.rs
//!
use super::{cancel_on_ctrl_c, docker_engine, StackArgs};
use crate::core::{config, error::Result};
use crate::resources::loader;
use anyhow::Context;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Remove every resource declared in a stack file, dependents first")]
pub struct DestroyArgs {
    #[command(flatten)]
    pub stack: StackArgs,
}

pub async fn handle_destroy(args: DestroyArgs) -> Result<()> {
    info!("Handling destroy command (file: {})", args.stack.file.display());

    let settings = config::load_settings().context("Failed to load devyard settings")?;
    let mut graph = loader::load_stack(&args.stack.file)?;
    let declared = graph.declared().count();

    let engine = docker_engine(settings)?;
    let result = engine.destroy(&mut graph, &cancel_on_ctrl_c()).await;

    let remaining: Vec<String> = graph
        .declared()
        .map(|(_, r)| r.reference().to_string())
        .collect();
    println!("Destroyed {} of {} resource(s).", declared - remaining.len(), declared);
    if !remaining.is_empty() {
        println!("Still present: {}", remaining.join(", "));
    }
    result
}
