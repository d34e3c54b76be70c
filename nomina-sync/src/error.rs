//! Error types for nomina-sync.

use thiserror::Error;

/// Boxed error returned by external sinks.
pub type SinkFault = Box<dyn std::error::Error + Send + Sync>;

/// All errors that can arise from join and reconciliation operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A value or completion was pushed for a source the join does not have.
    #[error("join source {index} out of range (join has {sources} sources)")]
    SourceOutOfRange { index: usize, sources: usize },

    /// A value was pushed after its source signalled completion.
    #[error("join source {0} already completed")]
    SourceCompleted(usize),

    /// The external sink rejected a call.
    #[error("sink rejected {op} for {path}: {source}")]
    Sink {
        op: &'static str,
        path: String,
        #[source]
        source: SinkFault,
    },
}
