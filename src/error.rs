use std::path::PathBuf;
use thiserror::Error;

/// Top-level pipeline error. Setup failures abort before any stage runs and
/// carry a distinct exit signal from stage failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Stage '{stage}' failed: {detail}")]
    StageFailure { stage: &'static str, detail: String },

    #[error("Debate phase failed: {}", failures.join("; "))]
    DebateFailed { failures: Vec<String> },

    #[error("Consensus synthesis failed: {0}")]
    ConsensusFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Process exit code for this failure. Setup errors exit with 2 so
    /// automation can tell misconfiguration apart from a failed agent call.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Setup(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Could not resolve repository root from {0}")]
    RepoRootUnresolved(PathBuf),

    #[error("Invalid backend spec '{value}' for stage '{stage}': expected provider:model")]
    InvalidBackendSpec { stage: String, value: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch issue #{issue} for refinement: {source}")]
    RefineFetchFailed {
        issue: u64,
        #[source]
        source: TrackerError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Config key 'planner.{key}' must be a string")]
    Type { key: String },
}

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Agent template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to spawn '{binary}': {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("gh CLI failed: {0}")]
    GhCli(String),

    #[error("Failed to parse gh output: {0}")]
    ParseOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
