use crate::cli::InitArgs;
use crate::prompt::{AGENTS_DIR, CONCLAVE_DIR, GUIDELINES_FILE};
use std::path::Path;
use tracing::info;

// Embedded default agent templates
const UNDERSTANDER_TEMPLATE: &str = include_str!("../../prompts/understander.md");
const BOLD_TEMPLATE: &str = include_str!("../../prompts/bold.md");
const CRITIQUE_TEMPLATE: &str = include_str!("../../prompts/critique.md");
const REDUCER_TEMPLATE: &str = include_str!("../../prompts/reducer.md");
const GUIDELINES_TEMPLATE: &str = include_str!("../../prompts/guidelines.md");

const TEMPLATES: [(&str, &str); 4] = [
    ("understander", UNDERSTANDER_TEMPLATE),
    ("bold", BOLD_TEMPLATE),
    ("critique", CRITIQUE_TEMPLATE),
    ("reducer", REDUCER_TEMPLATE),
];

/// Materialize the default agent templates into `.conclave/` so a fresh
/// repository can run the pipeline.
pub fn execute(args: InitArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let repo_root = crate::pipeline::resolve_repo_root(&cwd)?;

    let base = repo_root.join(CONCLAVE_DIR);
    let agents = base.join(AGENTS_DIR);
    std::fs::create_dir_all(&agents)?;

    for (name, content) in TEMPLATES {
        write_template(&agents.join(format!("{name}.md")), content, args.force)?;
    }
    write_template(&base.join(GUIDELINES_FILE), GUIDELINES_TEMPLATE, args.force)?;

    info!("Templates written to {:?}", base);
    Ok(())
}

fn write_template(path: &Path, content: &str, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        info!("Keeping existing {:?} (use --force to overwrite)", path);
        return Ok(());
    }
    std::fs::write(path, content)?;
    Ok(())
}
