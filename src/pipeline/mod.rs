//! Pipeline orchestrator: stage sequencing, the parallel debate phase,
//! artifact lifecycle, and failure propagation.

mod orchestrator;
mod types;

pub use orchestrator::Orchestrator;
pub use types::{Mode, PipelineOutcome, PipelineRun, Stage, StageResult};

use crate::error::SetupError;
use std::path::{Path, PathBuf};

/// Walk upward from `start` until a `.git` entry marks the repository root.
pub fn resolve_repo_root(start: &Path) -> Result<PathBuf, SetupError> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        if current.join(".git").exists() {
            return Ok(current.to_path_buf());
        }
        dir = current.parent();
    }
    Err(SetupError::RepoRootUnresolved(start.to_path_buf()))
}
