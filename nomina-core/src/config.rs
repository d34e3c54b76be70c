//! YAML pipeline configuration.
//!
//! # Location
//!
//! ```text
//! ~/.nomina/config.yaml
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)` / `save_at(path, …)`: explicit path; used in tests
//! - `load()`: derives the path from `dirs::home_dir()`, delegates to `load_at`
//!
//! A missing file is not an error: every field has a default.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::version::SourceKey;

/// Version-key scoping for one pipeline instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineKeys {
    /// Keys stripped before the join. Empty means "every local key".
    #[serde(default)]
    pub drop_keys: Vec<SourceKey>,
}

impl PipelineKeys {
    pub fn drop_set(&self) -> Option<BTreeSet<SourceKey>> {
        if self.drop_keys.is_empty() {
            None
        } else {
            Some(self.drop_keys.iter().cloned().collect())
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How long the dispatcher waits for a newer value before nominating.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Key scoping for the restore (cross-configuration) join.
    #[serde(default)]
    pub restore: PipelineKeys,
    /// Key scoping for the compile (evaluation + build) join.
    #[serde(default)]
    pub compile: PipelineKeys,
    /// Item metadata whose change means "replace", not "update".
    #[serde(default = "default_identity_properties")]
    pub identity_properties: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_identity_properties() -> Vec<String> {
    vec!["Link".to_string()]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            restore: PipelineKeys::default(),
            compile: PipelineKeys::default(),
            identity_properties: default_identity_properties(),
        }
    }
}

impl PipelineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load from an explicit path. Missing file → defaults.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// `load_at` convenience wrapper for `~/.nomina/config.yaml`.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_at(&default_path()?)
    }

    /// Atomically write to `path` (`.tmp` sibling, then rename).
    pub fn save_at(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

/// `~/.nomina/config.yaml`
pub fn default_path() -> Result<PathBuf, CoreError> {
    let home = dirs::home_dir().ok_or(CoreError::HomeNotFound)?;
    Ok(home.join(".nomina").join("config.yaml"))
}
