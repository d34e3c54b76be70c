//! Project scope: owns every pipeline stage of one project.
//!
//! Restore data flow:
//!
//! ```text
//! SnapshotSource (per configuration)
//!   → source link (restore key projection)
//!   → join link (all configurations)
//!   → restore link (build RestoreInfoTree)
//!   → NominationDispatcher → RestoreSink
//! ```
//!
//! All state lives here and dies with the scope; nothing is process-wide.
//! Teardown always disposes source links before the join they feed, and the
//! whole previous chain before a new one is wired.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nomina_core::{paths, PipelineConfig, ProjectSnapshot};
use nomina_restore::build;
use nomina_sync::{JoinedTuple, KeyProjection};

use crate::compile::{BoxedLanguageServiceSink, CompilePipeline};
use crate::dispatcher::{DispatchSender, NominationDispatcher, NominationRecord, RestoreSink};
use crate::faults::{Fault, FaultTracker};
use crate::link::{spawn_join_link, spawn_source_link, LinkHandle, LINK_CAPACITY};
use crate::source::SnapshotSource;

/// What a scope leaves behind once disposed.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub project_path: String,
    pub history: Vec<NominationRecord>,
    pub faults: Vec<Fault>,
}

/// The restore chain for one configuration set.
#[derive(Debug)]
struct RestoreLinks {
    configurations: Vec<String>,
    sources: Vec<LinkHandle>,
    join: LinkHandle,
    project: LinkHandle,
}

impl RestoreLinks {
    async fn dispose(self) {
        for source in self.sources {
            source.dispose().await;
        }
        self.join.dispose().await;
        self.project.dispose().await;
    }
}

#[derive(Debug)]
pub struct ProjectScope {
    project_path: String,
    project_dir: String,
    config: PipelineConfig,
    token: CancellationToken,
    faults: FaultTracker,
    dispatcher: NominationDispatcher,
    restore: Option<RestoreLinks>,
    compile: Vec<CompilePipeline>,
    generation: u64,
}

impl ProjectScope {
    pub fn new(
        project_path: impl Into<String>,
        config: PipelineConfig,
        sink: Arc<dyn RestoreSink>,
    ) -> Self {
        let project_path = project_path.into();
        let token = CancellationToken::new();
        let faults = FaultTracker::new(&project_path);
        let dispatcher = NominationDispatcher::spawn(
            project_path.clone(),
            config.debounce(),
            sink,
            faults.clone(),
            token.child_token(),
        );
        Self {
            project_dir: paths::directory_name(&project_path).to_string(),
            project_path,
            config,
            token,
            faults,
            dispatcher,
            restore: None,
            compile: Vec::new(),
            generation: 0,
        }
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    pub fn faults(&self) -> &FaultTracker {
        &self.faults
    }

    /// Names of the configurations currently joined, in join order.
    pub fn configurations(&self) -> &[String] {
        self.restore
            .as_ref()
            .map(|r| r.configurations.as_slice())
            .unwrap_or_default()
    }

    /// How many times the configuration set has been wired.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn history(&self) -> Vec<NominationRecord> {
        self.dispatcher.history().await
    }

    /// Replace the configuration set feeding the restore join.
    ///
    /// The previous chain is fully disposed before the new one is wired, so
    /// two joins never deliver to the dispatcher at once. A tree the old
    /// chain left waiting in the dispatcher is discarded.
    pub async fn set_configurations(&mut self, sources: Vec<SnapshotSource<ProjectSnapshot>>) {
        if let Some(previous) = self.restore.take() {
            tracing::info!(
                project = %self.project_path,
                configurations = ?previous.configurations,
                "resetting configuration set",
            );
            previous.dispose().await;
            self.dispatcher.discard_pending();
        }
        self.generation += 1;
        if sources.is_empty() {
            return;
        }

        let configurations: Vec<String> = sources.iter().map(|s| s.name().to_string()).collect();
        let projection = KeyProjection::from_keys(&self.config.restore);
        let mut inputs = Vec::with_capacity(sources.len());
        let mut source_links = Vec::with_capacity(sources.len());
        for source in sources {
            let (tx, rx) = mpsc::channel(LINK_CAPACITY);
            inputs.push(rx);
            source_links.push(spawn_source_link(
                source,
                projection.clone(),
                tx,
                self.token.child_token(),
            ));
        }

        let (tuple_tx, tuple_rx) = mpsc::channel(LINK_CAPACITY);
        let join = spawn_join_link(
            format!("restore-join#{}", self.generation),
            inputs,
            tuple_tx,
            self.token.child_token(),
        );
        let project_token = self.token.child_token();
        let project = LinkHandle::spawn(
            "restore-project",
            project_token.clone(),
            project_loop(
                self.project_path.clone(),
                tuple_rx,
                self.dispatcher.sender(),
                project_token,
            ),
        );

        tracing::info!(
            project = %self.project_path,
            configurations = ?configurations,
            generation = self.generation,
            "configuration set wired",
        );
        self.restore = Some(RestoreLinks {
            configurations,
            sources: source_links,
            join,
            project,
        });
    }

    /// Start a compile pipeline for one configuration.
    pub fn add_compile_pipeline(
        &mut self,
        evaluation: SnapshotSource<ProjectSnapshot>,
        build: SnapshotSource<ProjectSnapshot>,
        sink: BoxedLanguageServiceSink,
    ) {
        let pipeline = CompilePipeline::spawn(
            &self.project_dir,
            evaluation,
            build,
            &self.config,
            sink,
            self.faults.clone(),
            &self.token,
        );
        self.compile.push(pipeline);
    }

    /// Tear down every stage and report what happened.
    pub async fn dispose(mut self) -> ScopeReport {
        if let Some(restore) = self.restore.take() {
            restore.dispose().await;
        }
        for pipeline in self.compile.drain(..) {
            pipeline.dispose().await;
        }
        let history = self.dispatcher.dispose().await;
        self.token.cancel();
        tracing::info!(
            project = %self.project_path,
            nominations = history.len(),
            "project scope disposed",
        );
        ScopeReport {
            faults: self.faults.faults().await,
            project_path: self.project_path,
            history,
        }
    }
}

async fn project_loop(
    project_path: String,
    mut tuples: mpsc::Receiver<JoinedTuple<ProjectSnapshot>>,
    dispatcher: DispatchSender,
    token: CancellationToken,
) {
    loop {
        let tuple = tokio::select! {
            _ = token.cancelled() => break,
            tuple = tuples.recv() => tuple,
        };
        let Some(tuple) = tuple else { break };
        let tree = build(&project_path, &tuple.values);
        tracing::debug!(
            project = %project_path,
            frameworks = tree.target_frameworks.len(),
            versions = ?tuple.versions,
            "restore tree built",
        );
        dispatcher.submit(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use nomina_core::version::well_known;
    use nomina_core::{RuleSnapshot, VersionedValue};
    use nomina_restore::RestoreInfoTree;
    use nomina_sync::error::SinkFault;

    use crate::source::SnapshotPublisher;

    struct ChannelSink(mpsc::UnboundedSender<RestoreInfoTree>);

    #[async_trait]
    impl RestoreSink for ChannelSink {
        async fn nominate(
            &self,
            _project_path: &str,
            tree: &RestoreInfoTree,
            _cancel: CancellationToken,
        ) -> Result<(), SinkFault> {
            let _ = self.0.send(tree.clone());
            Ok(())
        }
    }

    fn restore_snapshot(moniker: &str) -> ProjectSnapshot {
        let mut rule = RuleSnapshot::default();
        rule.properties
            .insert("TargetFrameworkMoniker".to_string(), moniker.to_string());
        rule.properties.insert(
            "MSBuildProjectExtensionsPath".to_string(),
            "/src/app/obj/".to_string(),
        );
        ProjectSnapshot::new().with_rule("NuGetRestore", rule)
    }

    fn at(generation: u64, local: u64, snapshot: ProjectSnapshot) -> VersionedValue<ProjectSnapshot> {
        VersionedValue::new(
            snapshot,
            [
                (well_known::project_generation(), generation),
                (well_known::configured_project_version(), local),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            debounce_ms: 20,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn agreed_configurations_are_nominated_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scope = ProjectScope::new("/src/app/app.csproj", config(), Arc::new(ChannelSink(tx)));
        let mut a = SnapshotPublisher::new("net6.0");
        let mut b = SnapshotPublisher::new("net7.0");
        scope
            .set_configurations(vec![a.subscribe(), b.subscribe()])
            .await;
        assert_eq!(scope.configurations(), ["net6.0", "net7.0"]);

        a.publish(at(1, 5, restore_snapshot("net6.0"))).expect("publish");
        b.publish(at(1, 9, restore_snapshot("net7.0"))).expect("publish");

        let tree = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("nominated")
            .expect("tree");
        assert_eq!(tree.target_frameworks.keys().collect::<Vec<_>>(), ["net6.0", "net7.0"]);

        let report = scope.dispose().await;
        assert_eq!(report.history.len(), 1);
        assert!(report.faults.is_empty());
    }

    #[tokio::test]
    async fn reset_disposes_previous_chain_first() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scope = ProjectScope::new("/src/app/app.csproj", config(), Arc::new(ChannelSink(tx)));
        let mut a = SnapshotPublisher::new("net6.0");
        let mut b = SnapshotPublisher::new("net7.0");

        scope.set_configurations(vec![a.subscribe(), b.subscribe()]).await;
        a.publish(at(1, 1, restore_snapshot("net6.0"))).expect("publish");

        // net7.0 is dropped before it ever agreed; only net6.0 remains.
        scope.set_configurations(vec![a.subscribe()]).await;
        assert_eq!(scope.generation(), 2);
        b.publish(at(1, 1, restore_snapshot("net7.0"))).expect("publish");

        let tree = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("nominated")
            .expect("tree");
        assert_eq!(tree.target_frameworks.keys().collect::<Vec<_>>(), ["net6.0"]);
        scope.dispose().await;
    }

    #[tokio::test]
    async fn reset_discards_tree_pending_from_previous_set() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let slow = PipelineConfig {
            debounce_ms: 1_000,
            ..PipelineConfig::default()
        };
        let mut scope = ProjectScope::new("/src/app/app.csproj", slow, Arc::new(ChannelSink(tx)));
        let mut a = SnapshotPublisher::new("net6.0");
        let mut b = SnapshotPublisher::new("net7.0");

        scope.set_configurations(vec![a.subscribe(), b.subscribe()]).await;
        a.publish(at(1, 1, restore_snapshot("net6.0"))).expect("publish");
        b.publish(at(1, 1, restore_snapshot("net7.0"))).expect("publish");
        // Let the two-framework tree reach the dispatcher's debounce window.
        tokio::time::sleep(Duration::from_millis(200)).await;

        scope.set_configurations(vec![a.subscribe()]).await;
        let tree = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("nominated")
            .expect("tree");
        assert_eq!(tree.target_frameworks.keys().collect::<Vec<_>>(), ["net6.0"]);

        let report = scope.dispose().await;
        assert_eq!(report.history.len(), 1);
    }

    #[tokio::test]
    async fn empty_configuration_set_wires_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scope = ProjectScope::new("/src/app/app.csproj", config(), Arc::new(ChannelSink(tx)));
        scope.set_configurations(Vec::new()).await;
        assert!(scope.configurations().is_empty());
        let report = scope.dispose().await;
        assert!(report.history.is_empty());
    }
}
