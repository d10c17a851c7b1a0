pub mod defaults;

use crate::backend::BackendConfig;
use crate::error::ConfigError;
use defaults::{user_config_path, CONFIG_FILE};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const PLANNER_KEYS: [&str; 5] = ["backend", "understander", "bold", "critique", "reducer"];

/// Locate the effective config file: walk upward from `start` looking for a
/// local `conclave.yaml`, stopping at the first hit, then fall back to
/// `~/.config/conclave.yaml`. No file at all is fine.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }

    user_config_path().filter(|p| p.is_file())
}

/// Resolve per-stage backend overrides from the layered config. A missing
/// config file yields empty overrides; a malformed one is fatal.
pub fn resolve_backend_overrides(start: &Path) -> Result<BackendConfig, ConfigError> {
    let Some(path) = find_config_file(start) else {
        debug!("No config file found, using default backends");
        return Ok(BackendConfig::default());
    };

    debug!("Loading backend overrides from {:?}", path);
    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
        path: path.clone(),
        source: e,
    })?;

    parse_planner_section(&content)
}

/// Extract the `planner` mapping. Fields are optional strings; a present but
/// non-string value is a type error rather than a silent default, and
/// whitespace-only strings count as absent.
pub fn parse_planner_section(content: &str) -> Result<BackendConfig, ConfigError> {
    let doc: Value = serde_yaml::from_str(content)?;

    let Some(planner) = doc.get("planner") else {
        return Ok(BackendConfig::default());
    };

    let mut config = BackendConfig::default();
    for key in PLANNER_KEYS {
        let value = match planner.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Some(_) => return Err(ConfigError::Type { key: key.into() }),
        };

        match key {
            "backend" => config.backend = value,
            "understander" => config.understander = value,
            "bold" => config.bold = value,
            "critique" => config.critique = value,
            "reducer" => config.reducer = value,
            _ => unreachable!(),
        }
    }

    Ok(config)
}
