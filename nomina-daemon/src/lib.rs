//! Nomina daemon: async pipeline runtime.
//!
//! Wires the synchronous stages of `nomina-sync` and `nomina-restore` into
//! tokio tasks: snapshot sources, join links, the nomination dispatcher and
//! the per-project scope that owns them. Every stage is a task with its own
//! cancellation token and is torn down explicitly.

pub mod compile;
pub mod dispatcher;
pub mod error;
pub mod faults;
pub mod file_sink;
pub mod link;
pub mod runtime;
pub mod scope;
pub mod source;
pub mod watcher;

pub use dispatcher::{NominationDispatcher, NominationOutcome, NominationRecord, RestoreSink};
pub use error::DaemonError;
pub use faults::{Fault, FaultTracker};
pub use file_sink::FileRestoreSink;
pub use runtime::{init_tracing, run_watch, run_watch_until, watch_blocking, WatchOptions};
pub use scope::{ProjectScope, ScopeReport};
pub use source::{SnapshotPublisher, SnapshotSource};
