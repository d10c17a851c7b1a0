use crate::error::SetupError;
use serde::{Deserialize, Serialize};

/// Supported agent CLI providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Codex,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Claude => write!(f, "claude"),
            Provider::Codex => write!(f, "codex"),
        }
    }
}

/// A validated `provider:model` pair selecting which agent CLI runs a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub provider: Provider,
    pub model: String,
}

impl BackendSpec {
    /// Parse a raw override string. Empty or whitespace-only input is valid
    /// and means "use the default"; anything else must be `provider:model`
    /// with a known provider and a non-empty model.
    pub fn parse(raw: &str, stage: &str) -> Result<Option<Self>, SetupError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let invalid = || SetupError::InvalidBackendSpec {
            stage: stage.to_string(),
            value: raw.to_string(),
        };

        let (provider, model) = raw.split_once(':').ok_or_else(invalid)?;
        let provider = match provider.trim() {
            "claude" => Provider::Claude,
            "codex" => Provider::Codex,
            _ => return Err(invalid()),
        };

        let model = model.trim();
        if model.is_empty() {
            return Err(invalid());
        }

        Ok(Some(Self {
            provider,
            model: model.to_string(),
        }))
    }

    fn claude(model: &str) -> Self {
        Self {
            provider: Provider::Claude,
            model: model.to_string(),
        }
    }
}

impl std::fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Raw per-stage backend overrides, as read from config. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub backend: Option<String>,
    pub understander: Option<String>,
    pub bold: Option<String>,
    pub critique: Option<String>,
    pub reducer: Option<String>,
}

/// Fully resolved and validated backends, one per stage.
#[derive(Debug, Clone)]
pub struct ResolvedBackends {
    pub understander: BackendSpec,
    pub bold: BackendSpec,
    pub critique: BackendSpec,
    pub reducer: BackendSpec,
}

impl BackendConfig {
    /// Resolve every stage: explicit stage override, then the global
    /// `backend` override, then the hard-coded default. The understander
    /// defaults to a fast-tier model; the heavier stages to a strong tier.
    /// Any malformed override fails here, before a single stage runs.
    pub fn resolve(&self) -> Result<ResolvedBackends, SetupError> {
        let global = match &self.backend {
            Some(raw) => BackendSpec::parse(raw, "backend")?,
            None => None,
        };

        let resolve_stage = |over: &Option<String>,
                             stage: &str,
                             fallback: BackendSpec|
         -> Result<BackendSpec, SetupError> {
            if let Some(raw) = over {
                if let Some(spec) = BackendSpec::parse(raw, stage)? {
                    return Ok(spec);
                }
            }
            Ok(global.clone().unwrap_or(fallback))
        };

        Ok(ResolvedBackends {
            understander: resolve_stage(
                &self.understander,
                "understander",
                BackendSpec::claude("haiku"),
            )?,
            bold: resolve_stage(&self.bold, "bold", BackendSpec::claude("sonnet"))?,
            critique: resolve_stage(&self.critique, "critique", BackendSpec::claude("sonnet"))?,
            reducer: resolve_stage(&self.reducer, "reducer", BackendSpec::claude("sonnet"))?,
        })
    }
}
