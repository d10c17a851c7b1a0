use crate::config;
use tracing::info;

/// Print the per-stage backends after applying config precedence.
pub fn execute() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    if let Some(path) = config::find_config_file(&cwd) {
        info!("Using config {:?}", path);
    } else {
        info!("No config file found, showing defaults");
    }

    let overrides = config::resolve_backend_overrides(&cwd)?;
    let resolved = overrides.resolve()?;

    println!("understander  {}", resolved.understander);
    println!("bold          {}", resolved.bold);
    println!("critique      {}", resolved.critique);
    println!("reducer       {}", resolved.reducer);
    Ok(())
}
