use crate::error::PipelineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// External collaborator merging the three debate outputs into one plan.
/// Returns the path of the synthesized plan file.
#[async_trait]
pub trait Consensus: Send + Sync {
    async fn synthesize(
        &self,
        bold: &Path,
        critique: &Path,
        reducer: &Path,
    ) -> Result<PathBuf, PipelineError>;
}

/// Invokes the consensus binary with the three upstream paths as arguments;
/// the final plan path is its stdout.
pub struct CliConsensus {
    pub binary: PathBuf,
    pub working_dir: PathBuf,
}

#[async_trait]
impl Consensus for CliConsensus {
    async fn synthesize(
        &self,
        bold: &Path,
        critique: &Path,
        reducer: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let mut cmd = crate::agent::base_command(&self.binary);
        cmd.arg(bold).arg(critique).arg(reducer);
        cmd.current_dir(&self.working_dir);

        let out = cmd.output().await.map_err(|e| {
            PipelineError::ConsensusFailed(format!(
                "failed to spawn '{}': {}",
                self.binary.display(),
                e
            ))
        })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(PipelineError::ConsensusFailed(format!(
                "exit code {}: {}",
                out.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        let path = stdout.trim();
        if path.is_empty() {
            return Err(PipelineError::ConsensusFailed(
                "synthesizer printed no plan path".to_string(),
            ));
        }

        debug!("Consensus plan written to {}", path);
        Ok(PathBuf::from(path))
    }
}
