//! Per-configuration compile pipeline.
//!
//! Joins one configuration's evaluation source with its build source and
//! pushes every agreed pair through a [`ConfigurationContext`] into the
//! language-service sink. Evaluation diffs are applied before build diffs.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nomina_core::{PipelineConfig, ProjectSnapshot};
use nomina_sync::language_service::{ConfigurationContext, LanguageServiceSink};
use nomina_sync::{JoinedTuple, KeyProjection};

use crate::error::DaemonError;
use crate::faults::FaultTracker;
use crate::link::{spawn_join_link, spawn_source_link, LinkHandle, LINK_CAPACITY};
use crate::source::SnapshotSource;

/// Language-service sink owned by a compile pipeline task.
pub type BoxedLanguageServiceSink = Box<dyn LanguageServiceSink + Send>;

/// Running compile pipeline for one configuration.
#[derive(Debug)]
pub struct CompilePipeline {
    configuration: String,
    sources: Vec<LinkHandle>,
    join: LinkHandle,
    apply: LinkHandle,
}

impl CompilePipeline {
    pub fn spawn(
        project_dir: &str,
        evaluation: SnapshotSource<ProjectSnapshot>,
        build: SnapshotSource<ProjectSnapshot>,
        config: &PipelineConfig,
        sink: BoxedLanguageServiceSink,
        faults: FaultTracker,
        token: &CancellationToken,
    ) -> Self {
        let configuration = evaluation.name().to_string();
        let projection = KeyProjection::from_keys(&config.compile);

        let (eval_tx, eval_rx) = mpsc::channel(LINK_CAPACITY);
        let (build_tx, build_rx) = mpsc::channel(LINK_CAPACITY);
        let sources = vec![
            spawn_source_link(evaluation, projection.clone(), eval_tx, token.child_token()),
            spawn_source_link(build, projection, build_tx, token.child_token()),
        ];

        let (tuple_tx, tuple_rx) = mpsc::channel(LINK_CAPACITY);
        let join = spawn_join_link(
            format!("compile-join:{configuration}"),
            vec![eval_rx, build_rx],
            tuple_tx,
            token.child_token(),
        );

        let context =
            ConfigurationContext::new(configuration.clone(), project_dir, &config.identity_properties);
        let apply_token = token.child_token();
        let apply = LinkHandle::spawn(
            format!("compile:{configuration}"),
            apply_token.clone(),
            apply_loop(context, tuple_rx, sink, faults, apply_token),
        );

        Self {
            configuration,
            sources,
            join,
            apply,
        }
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    /// Dispose sources, then the join, then the applying task.
    pub async fn dispose(self) {
        for source in self.sources {
            source.dispose().await;
        }
        self.join.dispose().await;
        self.apply.dispose().await;
    }
}

async fn apply_loop(
    mut context: ConfigurationContext,
    mut tuples: mpsc::Receiver<JoinedTuple<ProjectSnapshot>>,
    mut sink: BoxedLanguageServiceSink,
    faults: FaultTracker,
    token: CancellationToken,
) {
    loop {
        let tuple = tokio::select! {
            _ = token.cancelled() => break,
            tuple = tuples.recv() => tuple,
        };
        let Some(tuple) = tuple else { break };
        let [evaluation, build] = tuple.values.as_slice() else {
            tracing::warn!(
                configuration = %context.configuration(),
                values = tuple.values.len(),
                "compile tuple has unexpected arity",
            );
            continue;
        };
        match context.apply_update(evaluation, build, sink.as_mut()) {
            Ok(summary) => {
                tracing::debug!(
                    configuration = %context.configuration(),
                    added = summary.added,
                    removed = summary.removed,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "language service updated",
                );
            }
            Err(err) => {
                let err = DaemonError::from(err);
                faults
                    .record(format!("compile:{}", context.configuration()), err.to_string())
                    .await;
            }
        }
    }
}
