use super::{base_command, Agent, AgentOutcome};
use crate::error::AgentError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct CodexAgent {
    pub binary: PathBuf,
    pub model: String,
    pub working_dir: PathBuf,
}

#[async_trait]
impl Agent for CodexAgent {
    fn name(&self) -> &'static str {
        "codex"
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<AgentOutcome, AgentError> {
        let prompt = tokio::fs::read_to_string(input).await?;

        let mut cmd = base_command(&self.binary);
        cmd.arg("exec")
            .arg("--model")
            .arg(&self.model)
            // Codex writes the final assistant message straight to the
            // stage output file.
            .arg("--output-last-message")
            .arg(output)
            .arg("-");

        cmd.current_dir(&self.working_dir);
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd.spawn().map_err(|e| AgentError::Spawn {
            binary: self.binary.display().to_string(),
            source: e,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let out = child.wait_with_output().await?;

        let exit_code = out.status.code().unwrap_or(-1);
        if exit_code != 0 {
            debug!(
                "codex exited with {}: {}",
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
