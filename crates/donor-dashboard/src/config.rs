use anyhow::Context;
use donor_registry::{RepositoryOptions, DEFAULT_ACTOR, STATE_KEY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub state_key: String,
    pub actor: String,
    pub log_level: String,
    pub json_logs: bool,
    /// Alerts shown by `alerts` when no `--limit` is given.
    pub queue_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".donor-watch"),
            state_key: STATE_KEY.to_string(),
            actor: DEFAULT_ACTOR.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            queue_limit: 20,
        }
    }
}

impl DashboardConfig {
    /// Reads a JSON config file; missing keys fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            state_key: self.state_key.clone(),
            actor: self.actor.clone(),
        }
    }
}
