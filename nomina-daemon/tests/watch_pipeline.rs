use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nomina_core::version::well_known;
use nomina_core::{Item, PipelineConfig, ProjectSnapshot, RuleSnapshot, VersionedValue};
use nomina_daemon::{
    run_watch_until, NominationOutcome, ProjectScope, RestoreSink, SnapshotPublisher, WatchOptions,
};
use nomina_restore::RestoreInfoTree;
use nomina_sync::error::SinkFault;

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

fn configuration(moniker: &str, packages: &[(&str, &str)]) -> ProjectSnapshot {
    let mut restore = RuleSnapshot::default();
    restore
        .properties
        .insert("TargetFrameworkMoniker".to_string(), moniker.to_string());
    let packages = RuleSnapshot {
        items: packages
            .iter()
            .map(|(name, version)| Item::new(*name).with("Version", *version))
            .collect(),
        ..RuleSnapshot::default()
    };
    ProjectSnapshot::new()
        .with_rule("NuGetRestore", restore)
        .with_rule("PackageReference", packages)
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

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        debounce_ms: 20,
        ..PipelineConfig::default()
    }
}

async fn next_tree(rx: &mut mpsc::UnboundedReceiver<RestoreInfoTree>) -> RestoreInfoTree {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("nomination within timeout")
        .expect("sink open")
}

fn package_version(tree: &RestoreInfoTree, moniker: &str, package: &str) -> Option<String> {
    tree.framework(moniker)?
        .package_references
        .get(package)?
        .property("Version")
        .map(str::to_string)
}

#[tokio::test]
async fn lagging_configuration_holds_back_nomination_until_it_catches_up() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scope = ProjectScope::new("/src/app/App.csproj", fast_config(), Arc::new(ChannelSink(tx)));
    let mut net6 = SnapshotPublisher::new("net6.0");
    let mut net7 = SnapshotPublisher::new("net7.0");
    scope
        .set_configurations(vec![net6.subscribe(), net7.subscribe()])
        .await;

    net6.publish(at(1, 3, configuration("net6.0", &[("Foo", "1.0")])))
        .expect("publish");
    net7.publish(at(1, 8, configuration("net7.0", &[("Foo", "1.0")])))
        .expect("publish");
    let first = next_tree(&mut rx).await;
    assert_eq!(package_version(&first, "net7.0", "Foo").as_deref(), Some("1.0"));

    // net6.0 moves to generation 2; net7.0 has not re-evaluated yet.
    net6.publish(at(2, 4, configuration("net6.0", &[("Foo", "2.0")])))
        .expect("publish");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "no nomination while configurations disagree");

    net7.publish(at(2, 9, configuration("net7.0", &[("Foo", "2.0")])))
        .expect("publish");
    let second = next_tree(&mut rx).await;
    assert_eq!(package_version(&second, "net6.0", "Foo").as_deref(), Some("2.0"));
    assert_eq!(package_version(&second, "net7.0", "Foo").as_deref(), Some("2.0"));

    let report = scope.dispose().await;
    let delivered = report
        .history
        .iter()
        .filter(|r| r.outcome == NominationOutcome::Delivered)
        .count();
    assert_eq!(delivered, 2);
    assert!(report.faults.is_empty());
}

#[tokio::test]
async fn configuration_republished_at_same_generation_is_nominated() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scope = ProjectScope::new("/src/app/App.csproj", fast_config(), Arc::new(ChannelSink(tx)));
    let mut net6 = SnapshotPublisher::new("net6.0");
    let mut net7 = SnapshotPublisher::new("net7.0");
    scope
        .set_configurations(vec![net6.subscribe(), net7.subscribe()])
        .await;

    net6.publish(at(1, 3, configuration("net6.0", &[("Foo", "1.0")])))
        .expect("publish");
    net7.publish(at(1, 8, configuration("net7.0", &[("Foo", "1.0")])))
        .expect("publish");
    let first = next_tree(&mut rx).await;
    assert_eq!(package_version(&first, "net6.0", "Foo").as_deref(), Some("1.0"));

    // Only net6.0's local version moves; the project generation stays at 1.
    net6.publish(at(1, 4, configuration("net6.0", &[("Foo", "1.1")])))
        .expect("publish");
    let second = next_tree(&mut rx).await;
    assert_eq!(package_version(&second, "net6.0", "Foo").as_deref(), Some("1.1"));
    assert_eq!(package_version(&second, "net7.0", "Foo").as_deref(), Some("1.0"));

    let report = scope.dispose().await;
    assert_eq!(report.history.len(), 2);
    assert!(report.faults.is_empty());
}

fn write_doc(dir: &Path, name: &str, generation: u64, version: &str) {
    let doc = format!(
        "versions:\n  project-generation: {generation}\n  local:configured-project-version: {generation}\n\
         rules:\n  NuGetRestore:\n    properties:\n      TargetFrameworkMoniker: {name}\n  \
         PackageReference:\n    items:\n      - name: Foo\n        metadata:\n          Version: \"{version}\"\n"
    );
    fs::write(dir.join(format!("{name}.yaml")), doc).expect("write snapshot");
}

async fn wait_for_version(path: &Path, moniker: &str, version: &str) -> RestoreInfoTree {
    for _ in 0..200 {
        if let Ok(text) = fs::read_to_string(path) {
            if let Ok(tree) = serde_json::from_str::<RestoreInfoTree>(&text) {
                if package_version(&tree, moniker, "Foo").as_deref() == Some(version) {
                    return tree;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} never reached {moniker} Foo {version}", path.display());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watched_directory_drives_file_nominations() {
    let snapshots = TempDir::new().expect("tempdir");
    let out = TempDir::new().expect("tempdir");
    write_doc(snapshots.path(), "net6.0", 1, "1.0");
    write_doc(snapshots.path(), "net7.0", 1, "1.0");

    let token = CancellationToken::new();
    let options = WatchOptions {
        dir: snapshots.path().to_path_buf(),
        out: out.path().to_path_buf(),
        project: "/src/app/App.csproj".to_string(),
        config: fast_config(),
    };
    let handle = tokio::spawn(run_watch_until(options, token.clone()));

    let output = out.path().join("App.restore.json");
    let tree = wait_for_version(&output, "net6.0", "1.0").await;
    assert_eq!(tree.target_frameworks.len(), 2);

    // Give the watcher time to register before editing.
    tokio::time::sleep(Duration::from_millis(300)).await;
    write_doc(snapshots.path(), "net6.0", 2, "2.0");
    write_doc(snapshots.path(), "net7.0", 2, "2.0");
    wait_for_version(&output, "net7.0", "2.0").await;

    token.cancel();
    let report = handle.await.expect("join").expect("watch");
    assert!(report
        .history
        .iter()
        .any(|r| r.outcome == NominationOutcome::Delivered));
    assert!(report.faults.is_empty());
}
