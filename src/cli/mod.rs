pub mod backends;
pub mod init;
pub mod plan;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conclave")]
#[command(
    author,
    version,
    about = "Multi-agent planning pipeline for Claude Code and Codex CLI"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the planning pipeline for a feature request
    Plan(PlanArgs),

    /// Print the resolved per-stage backends
    Backends,

    /// Write the default agent templates into .conclave/
    Init(InitArgs),
}

#[derive(Parser, Clone)]
pub struct PlanArgs {
    /// Feature description (refinement focus when --refine is given)
    #[arg(value_name = "FEATURE")]
    pub feature: Option<String>,

    /// Refine the plan on an existing issue instead of creating one
    #[arg(long, value_name = "ISSUE")]
    pub refine: Option<u64>,

    /// Keep everything local: no issue creation, no publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Override repository (owner/repo) for issue operations
    #[arg(long)]
    pub repo: Option<String>,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    /// Overwrite existing templates
    #[arg(long)]
    pub force: bool,
}
