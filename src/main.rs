use clap::Parser;
use pmp_trace_recovery::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Evaluate(args) => cli::evaluate::run(args).await,
    }
}
