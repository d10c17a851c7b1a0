mod claude;
mod codex;

pub use claude::ClaudeAgent;
pub use codex::CodexAgent;

use crate::backend::{BackendSpec, Provider};
use crate::config::defaults;
use crate::error::AgentError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Result of one agent invocation. Success additionally requires the output
/// file to be non-empty; the orchestrator enforces that contract.
#[derive(Debug)]
pub struct AgentOutcome {
    pub exit_code: i32,
    pub duration: Duration,
}

impl AgentOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// One external agent CLI invocation: reads the rendered prompt at `input`,
/// leaves the agent's answer at `output`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, input: &Path, output: &Path) -> Result<AgentOutcome, AgentError>;
}

/// Maps a resolved backend spec to a concrete agent implementation.
pub trait AgentFactory: Send + Sync {
    fn agent(&self, spec: &BackendSpec) -> Arc<dyn Agent>;
}

/// Production registry dispatching on the provider enum.
pub struct CliAgentFactory {
    pub working_dir: PathBuf,
}

impl AgentFactory for CliAgentFactory {
    fn agent(&self, spec: &BackendSpec) -> Arc<dyn Agent> {
        match spec.provider {
            Provider::Claude => Arc::new(ClaudeAgent {
                binary: defaults::default_claude_binary(),
                model: spec.model.clone(),
                tools: defaults::default_claude_tools(),
                permission_mode: defaults::default_permission_mode(),
                working_dir: self.working_dir.clone(),
            }),
            Provider::Codex => Arc::new(CodexAgent {
                binary: defaults::default_codex_binary(),
                model: spec.model.clone(),
                working_dir: self.working_dir.clone(),
            }),
        }
    }
}

/// Build a command that resolves plain names through PATH while honoring
/// explicit paths.
pub(crate) fn base_command(binary: &Path) -> tokio::process::Command {
    let binary_str = binary.to_string_lossy();
    if binary_str.contains('/') || binary_str.contains('\\') {
        tokio::process::Command::new(binary)
    } else {
        tokio::process::Command::new(binary_str.as_ref())
    }
}
