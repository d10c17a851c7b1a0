use crate::error::PromptError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONCLAVE_DIR: &str = ".conclave";
pub const AGENTS_DIR: &str = "agents";
pub const GUIDELINES_FILE: &str = "guidelines.md";

/// Assembles stage input prompts from agent templates under the repo's
/// `.conclave` directory.
pub struct PromptRenderer {
    agents_dir: PathBuf,
    guideline_path: PathBuf,
}

impl PromptRenderer {
    pub fn new(repo_root: &Path) -> Self {
        let base = repo_root.join(CONCLAVE_DIR);
        Self {
            agents_dir: base.join(AGENTS_DIR),
            guideline_path: base.join(GUIDELINES_FILE),
        }
    }

    /// Write a single stage prompt composed of the agent template (front
    /// matter stripped), optional shared planning guidelines, the feature
    /// request, and optional upstream stage output.
    pub fn render(
        &self,
        out: &Path,
        template: &str,
        with_guideline: bool,
        feature_text: &str,
        context: Option<&Path>,
    ) -> Result<(), PromptError> {
        let template_path = self.agents_dir.join(format!("{template}.md"));
        if !template_path.is_file() {
            return Err(PromptError::TemplateNotFound(template_path));
        }

        let body = std::fs::read_to_string(&template_path)?;
        let mut prompt = strip_front_matter(&body).trim_end().to_string();

        if with_guideline {
            match std::fs::read_to_string(&self.guideline_path) {
                Ok(guidelines) => {
                    prompt.push_str("\n\n## Planning Guidelines\n\n");
                    prompt.push_str(strip_front_matter(&guidelines).trim());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("No guideline file at {:?}, skipping", self.guideline_path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        prompt.push_str("\n\n## Feature Request\n\n");
        prompt.push_str(feature_text.trim());

        if let Some(context_path) = context {
            if context_path.exists() {
                let upstream = std::fs::read_to_string(context_path)?;
                prompt.push_str("\n\n## Previous Stage Output\n\n");
                prompt.push_str(upstream.trim());
            }
        }

        prompt.push('\n');
        std::fs::write(out, prompt)?;
        Ok(())
    }
}

/// Strip a leading YAML front matter block (`---` fenced) if present.
/// The close fence must be a whole `---` line; lines that merely start
/// with dashes (horizontal rules, `----`) do not terminate the block.
fn strip_front_matter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---\n") else {
        return content;
    };
    if let Some(end) = rest.find("\n---\n") {
        return &rest[end + 5..];
    }
    if rest.strip_suffix("\n---").is_some() {
        return "";
    }
    content
}
