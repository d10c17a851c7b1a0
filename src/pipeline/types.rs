use crate::backend::BackendConfig;
use std::path::PathBuf;
use std::time::Duration;

/// How the pipeline was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plan a fresh feature and publish to a new tracked issue.
    Create,
    /// Plan a fresh feature, keep everything local.
    DryRun,
    /// Re-plan against an existing issue's body.
    Refine(u64),
}

/// One pipeline invocation, immutable after validation.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Feature description in create/dry-run mode; refinement focus in
    /// refine mode (may be empty there).
    pub feature_text: String,
    pub mode: Mode,
    pub verbose: bool,
    pub backend_overrides: BackendConfig,
}

/// The four agent stages. Consensus synthesis is an external collaborator,
/// not a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Understander,
    Bold,
    Critique,
    Reducer,
}

impl Stage {
    pub fn slug(&self) -> &'static str {
        match self {
            Stage::Understander => "understander",
            Stage::Bold => "bold",
            Stage::Critique => "critique",
            Stage::Reducer => "reducer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Understander => "Understanding",
            Stage::Bold => "Bold proposal",
            Stage::Critique => "Critique",
            Stage::Reducer => "Reduction",
        }
    }

    /// The understander works from the feature text alone; every later
    /// stage also gets the shared planning guidelines.
    pub fn uses_guideline(&self) -> bool {
        !matches!(self, Stage::Understander)
    }
}

/// Outcome of one agent stage invocation.
#[derive(Debug)]
pub struct StageResult {
    pub stage: Stage,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub exit_code: i32,
    pub duration: Duration,
}

impl StageResult {
    /// A stage succeeds only with a clean exit and a non-empty output file.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
            && std::fs::metadata(&self.output_path)
                .map(|m| m.len() > 0)
                .unwrap_or(false)
    }

    pub fn failure_detail(&self) -> String {
        if self.exit_code != 0 {
            format!("agent exited with code {}", self.exit_code)
        } else {
            format!("empty output at {}", self.output_path.display())
        }
    }
}

/// Successful pipeline result handed back to the caller.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub consensus_path: PathBuf,
    pub issue_number: Option<u64>,
    pub issue_url: Option<String>,
}
