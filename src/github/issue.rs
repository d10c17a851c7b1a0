use super::IssueTracker;
use crate::error::TrackerError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Issue tracker backed by the `gh` CLI.
pub struct GhTracker {
    repo: Option<String>,
}

impl GhTracker {
    pub fn new(repo: Option<String>) -> Self {
        Self { repo }
    }

    fn gh(&self) -> Command {
        let mut cmd = Command::new("gh");
        cmd.arg("issue");
        cmd
    }

    fn with_repo(&self, cmd: &mut Command) {
        if let Some(repo) = &self.repo {
            cmd.arg("--repo").arg(repo);
        }
    }

    fn run(cmd: &mut Command) -> Result<String, TrackerError> {
        let output = cmd.output().map_err(TrackerError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrackerError::GhCli(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl IssueTracker for GhTracker {
    fn create(&self, title: &str) -> Result<u64, TrackerError> {
        let mut cmd = self.gh();
        cmd.arg("create")
            .arg("--title")
            .arg(title)
            .arg("--body")
            .arg("Planning in progress. The consensus plan will replace this body.");
        self.with_repo(&mut cmd);

        let url = Self::run(&mut cmd)?;
        debug!("Created issue at {}", url);
        issue_number_from_url(&url)
    }

    fn fetch(&self, issue: u64) -> Result<String, TrackerError> {
        let mut cmd = self.gh();
        cmd.arg("view").arg(issue.to_string()).arg("--json").arg("body");
        self.with_repo(&mut cmd);

        let stdout = Self::run(&mut cmd)?;
        let value: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| TrackerError::ParseOutput(e.to_string()))?;
        value
            .get("body")
            .and_then(|b| b.as_str())
            .map(|b| b.to_string())
            .ok_or_else(|| TrackerError::ParseOutput("missing 'body' field".to_string()))
    }

    fn publish(&self, issue: u64, title: &str, body_path: &Path) -> Result<String, TrackerError> {
        let mut cmd = self.gh();
        cmd.arg("edit")
            .arg(issue.to_string())
            .arg("--title")
            .arg(title)
            .arg("--body-file")
            .arg(body_path);
        self.with_repo(&mut cmd);

        // gh prints the issue URL on success
        Self::run(&mut cmd)
    }
}

fn issue_number_from_url(url: &str) -> Result<u64, TrackerError> {
    url.rsplit('/')
        .next()
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| TrackerError::ParseOutput(format!("no issue number in '{url}'")))
}
