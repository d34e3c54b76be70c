use std::path::PathBuf;

use thiserror::Error;

/// Error surface for pipeline stages, the watcher and the file sink.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("core error: {0}")]
    Core(#[from] nomina_core::CoreError),

    #[error("sync error: {0}")]
    Sync(#[from] nomina_sync::SyncError),

    #[error("restore error: {0}")]
    Restore(#[from] nomina_restore::RestoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("nomination cancelled")]
    Cancelled,

    #[error("{task} task join failure: {message}")]
    Task { task: String, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
