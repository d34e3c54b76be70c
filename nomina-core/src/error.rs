//! Error types for nomina-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::version::SourceKey;

/// All errors that can arise from the core data model and configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A source key in text form could not be parsed.
    #[error("invalid source key '{0}'")]
    InvalidSourceKey(String),

    /// A publisher tried to move a version backwards.
    #[error("version for {key} went backwards ({previous} -> {next})")]
    NonMonotonicVersion {
        key: SourceKey,
        previous: u64,
        next: u64,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.nomina/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`CoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
