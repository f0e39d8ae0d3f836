//! CLI module for PMP Trace Recovery
//!
//! Provides subcommands:
//! - `evaluate`: recover trace links between two element collections

pub mod evaluate;

use clap::{Parser, Subcommand};

/// PMP Trace Recovery - LLM-assisted traceability link recovery
#[derive(Parser)]
#[command(name = "pmp-trace-recovery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Recover trace links between source and target elements
    Evaluate(evaluate::EvaluateArgs),
}
