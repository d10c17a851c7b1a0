use crate::agent::CliAgentFactory;
use crate::cli::PlanArgs;
use crate::config;
use crate::config::defaults::default_consensus_binary;
use crate::consensus::CliConsensus;
use crate::error::PipelineError;
use crate::github::GhTracker;
use crate::pipeline::{resolve_repo_root, Mode, Orchestrator, PipelineOutcome, PipelineRun};
use std::sync::Arc;
use tracing::error;

pub async fn execute(args: PlanArgs, verbose: bool) -> anyhow::Result<()> {
    let mode = match (args.refine, args.dry_run) {
        (Some(issue), _) => Mode::Refine(issue),
        (None, true) => Mode::DryRun,
        (None, false) => Mode::Create,
    };

    let feature_text = args.feature.unwrap_or_default();
    if feature_text.trim().is_empty() && !matches!(mode, Mode::Refine(_)) {
        anyhow::bail!("a feature description is required unless --refine is given");
    }

    match run_pipeline(feature_text, mode, verbose, args.repo).await {
        Ok(outcome) => {
            // The single stdout line automation scrapes for; everything
            // else goes to stderr.
            println!("{}", outcome.consensus_path.display());
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run_pipeline(
    feature_text: String,
    mode: Mode,
    verbose: bool,
    repo: Option<String>,
) -> Result<PipelineOutcome, PipelineError> {
    let cwd = std::env::current_dir()?;
    let repo_root = resolve_repo_root(&cwd)?;
    let backend_overrides =
        config::resolve_backend_overrides(&cwd).map_err(crate::error::SetupError::from)?;

    let run = PipelineRun {
        feature_text,
        mode,
        verbose,
        backend_overrides,
    };

    let orchestrator = Orchestrator::new(
        run,
        &repo_root,
        Arc::new(CliAgentFactory {
            working_dir: repo_root.clone(),
        }),
        Arc::new(CliConsensus {
            binary: default_consensus_binary(),
            working_dir: repo_root.clone(),
        }),
        Arc::new(GhTracker::new(repo)),
    );

    orchestrator.run().await
}
