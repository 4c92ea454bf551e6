//! # Devyard Validate Handler
//!
//! File: cli/src/commands/validate.rs
//!
//! Parses the stack file and computes its dependency levels without connecting
//! to Docker. Prints the order `apply` would use.
//!
use super::StackArgs;
use crate::core::error::Result;
use crate::resources::loader;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Check a stack file and print its apply order")]
pub struct ValidateArgs {
    #[command(flatten)]
    pub stack: StackArgs,
}

pub async fn handle_validate(args: ValidateArgs) -> Result<()> {
    info!("Handling validate command (file: {})", args.stack.file.display());

    let graph = loader::load_stack(&args.stack.file)?;
    if graph.is_empty() {
        println!("Stack is valid but declares no resources.");
        return Ok(());
    }
    let levels = graph.levels()?;
    for (depth, level) in levels.iter().enumerate() {
        let references: Vec<String> = level
            .iter()
            .filter_map(|id| graph.get(*id))
            .map(|r| r.reference().to_string())
            .collect();
        println!("Level {}: {}", depth, references.join(", "));
    }
    println!(
        "Stack is valid: {} resource(s) in {} level(s).",
        graph.len(),
        levels.len()
    );
    Ok(())
}
