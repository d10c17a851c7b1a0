mod issue;

pub use issue::GhTracker;

use crate::error::TrackerError;
use std::path::Path;

/// Issue tracker collaborator. Creation and publishing are best-effort at
/// the call site; fetch failures in refine mode are fatal.
pub trait IssueTracker: Send + Sync {
    /// Create a placeholder issue and return its number.
    fn create(&self, title: &str) -> Result<u64, TrackerError>;

    /// Fetch an existing issue's body text.
    fn fetch(&self, issue: u64) -> Result<String, TrackerError>;

    /// Replace an issue's title and body, returning the issue URL.
    fn publish(&self, issue: u64, title: &str, body_path: &Path) -> Result<String, TrackerError>;
}
