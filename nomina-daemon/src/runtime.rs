//! Runtime entry points for the long-running watch mode.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use nomina_core::PipelineConfig;

use crate::error::{io_err, DaemonError};
use crate::file_sink::FileRestoreSink;
use crate::scope::{ProjectScope, ScopeReport};
use crate::watcher::{watch_directory, SnapshotFeed};

/// Inputs of `nomina watch`.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory of `<configuration>.yaml` snapshot documents.
    pub dir: PathBuf,
    /// Where restore nominations are written.
    pub out: PathBuf,
    /// Project file the snapshots belong to.
    pub project: String,
    pub config: PipelineConfig,
}

/// Start watch mode and block the current thread until Ctrl-C.
pub fn watch_blocking(options: WatchOptions) -> Result<ScopeReport, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run_watch(options))
}

/// Run watch mode until Ctrl-C.
pub async fn run_watch(options: WatchOptions) -> Result<ScopeReport, DaemonError> {
    let token = CancellationToken::new();

    let signal_handle = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    token.cancel();
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            Ok(())
                        }
                        Err(err) => Err(io_err("ctrl-c", err)),
                    }
                }
            }
        })
    };

    let result = run_watch_until(options, token.clone()).await;
    token.cancel();
    handle_join("signal_handler", signal_handle.await)?;
    result
}

/// Run watch mode until `token` is cancelled, then dispose the project scope
/// and return its report.
pub async fn run_watch_until(
    options: WatchOptions,
    token: CancellationToken,
) -> Result<ScopeReport, DaemonError> {
    let mut feed = SnapshotFeed::new(&options.dir);
    feed.load_all()?;

    let sink = Arc::new(FileRestoreSink::new(&options.out));
    let mut scope = ProjectScope::new(options.project, options.config, sink);
    scope.set_configurations(feed.sources()).await;

    let result = watch_directory(feed, &mut scope, token).await;
    let report = scope.dispose().await;
    result.map(|()| report)
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task: task.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Install the `fmt` subscriber (`RUST_LOG`, default `info`). Safe to call
/// more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
