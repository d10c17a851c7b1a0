use super::{base_command, Agent, AgentOutcome};
use crate::error::AgentError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ClaudeAgent {
    pub binary: PathBuf,
    pub model: String,
    pub tools: Vec<String>,
    pub permission_mode: String,
    pub working_dir: PathBuf,
}

#[async_trait]
impl Agent for ClaudeAgent {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<AgentOutcome, AgentError> {
        let prompt = tokio::fs::read_to_string(input).await?;

        let mut cmd = base_command(&self.binary);
        cmd.current_dir(&self.working_dir);

        // Ensure subscription auth is used (not API key)
        cmd.env_remove("ANTHROPIC_API_KEY");

        cmd.arg("-p")
            .arg(&prompt)
            .arg("--model")
            .arg(&self.model)
            .arg("--allowedTools")
            .arg(self.tools.join(","))
            .arg("--permission-mode")
            .arg(&self.permission_mode);

        let start = std::time::Instant::now();
        let out = cmd.output().await.map_err(|e| AgentError::Spawn {
            binary: self.binary.display().to_string(),
            source: e,
        })?;

        tokio::fs::write(output, &out.stdout).await?;

        let exit_code = out.status.code().unwrap_or(-1);
        if exit_code != 0 {
            debug!(
                "claude exited with {}: {}",
                exit_code,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        Ok(AgentOutcome {
            exit_code,
            duration: start.elapsed(),
        })
    }
}
