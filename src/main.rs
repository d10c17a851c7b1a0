use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod agent;
mod backend;
mod cli;
mod config;
mod consensus;
mod error;
mod github;
mod pipeline;
mod progress;
mod prompt;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose. Diagnostics go to
    // stderr so stdout carries nothing but the result path.
    let filter = if cli.verbose {
        EnvFilter::new("conclave=debug")
    } else {
        EnvFilter::new("conclave=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Plan(args) => cli::plan::execute(args, cli.verbose).await,
        Commands::Backends => cli::backends::execute(),
        Commands::Init(args) => cli::init::execute(args),
    }
}
