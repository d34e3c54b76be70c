//! Error types for nomina-restore.

use thiserror::Error;

/// All errors that can arise from rendering restore trees.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// YAML serialization of a tree failed.
    #[error("yaml render error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization of a tree failed.
    #[error("json render error: {0}")]
    Json(#[from] serde_json::Error),
}
