use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_HISTORY_LIMIT};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// What a session does when saving the user's message fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PersistPolicy {
    /// Log the failure and open the run stream anyway
    #[default]
    BestEffort,
    /// Fail the run before the stream is opened
    Required,
}

/// Client configuration, loadable from a camelCase JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Sent as the `OpenAI-Organization` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    pub history_limit: u32,

    /// Fail a run when the stream is silent for this long. Unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_idle_timeout_secs: Option<u64>,

    pub persist_policy: PersistPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: None,
            organization: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            stream_idle_timeout_secs: None,
            persist_policy: PersistPolicy::default(),
        }
    }
}

impl CoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// `<config_dir>/aify/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aify").join("config.json"))
    }

    /// Resolve config: explicit file, else the default file if present, else defaults.
    /// Environment variables are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `AIFY_BASE_URL`, `AIFY_SECRET_KEY` and `AIFY_ORGANIZATION` overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(url) = non_empty("AIFY_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = non_empty("AIFY_SECRET_KEY") {
            self.secret_key = Some(key);
        }
        if let Some(org) = non_empty("AIFY_ORGANIZATION") {
            self.organization = Some(org);
        }
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_secs.map(Duration::from_secs)
    }
}
