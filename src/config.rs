//! Configuration for recurdo.
//!
//! Settings come from an optional TOML file, then environment overrides:
//! `TASKS_DB` for the database path and `RECURDO_LOG` for the log filter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const TASKS_DB_ENV: &str = "TASKS_DB";
pub const LOG_ENV: &str = "RECURDO_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the JSON task database.
    pub tasks_db: PathBuf,
    /// `tracing` filter directive, e.g. `"recurdo=debug"`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tasks_db: default_db_path(),
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Load configuration from the default locations, then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let candidates = [
            Some(PathBuf::from("recurdo.toml")),
            dirs::config_dir().map(|p| p.join("recurdo").join("config.toml")),
        ];
        let mut config = match candidates.into_iter().flatten().find(|p| p.exists()) {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `TASKS_DB` / `RECURDO_LOG` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup(TASKS_DB_ENV).filter(|v| !v.is_empty()) {
            self.tasks_db = PathBuf::from(db);
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
    }
}

/// Returns the default path of the tasks database (`tasks.json`).
///
/// `~/.local/share/recurdo/tasks.json` on Linux, `./tasks.json` when no data
/// directory is known.
pub fn default_db_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(mut p) => {
            p.push("recurdo");
            p.push("tasks.json");
            p
        }
        None => PathBuf::from("tasks.json"),
    }
}
