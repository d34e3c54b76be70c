//! Reconcile a diff against a stateful external sink.
//!
//! Per key:
//!
//! | diff bucket | tracked? | action                         |
//! |-------------|----------|--------------------------------|
//! | removed     | yes      | `Remove`, untrack              |
//! | removed     | no       | nothing                        |
//! | added       | no       | `Add`, track                   |
//! | added       | yes      | nothing                        |
//! | changed     | identity | `Remove` (if tracked) + `Add`  |
//! | changed     | other    | `Update` (or `Add` if untracked)|
//!
//! The same change usually arrives twice, once from evaluation and once from
//! the design-time build; the tracked set makes the second delivery a no-op
//! whatever the order.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use nomina_core::{paths, Item, KeyedCollection, ProjectChangeDiff};

use crate::diff::normalize_renames;
use crate::error::{SinkFault, SyncError};
use crate::tracked::TrackedPathSet;

/// Item metadata carrying an already-resolved path.
pub const FULL_PATH: &str = "FullPath";

/// Which notification a diff came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    Evaluation,
    Build,
}

impl fmt::Display for ChangeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOrigin::Evaluation => write!(f, "evaluation"),
            ChangeOrigin::Build => write!(f, "build"),
        }
    }
}

/// One call against the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ReconcileOp {
    Add {
        path: String,
        metadata: BTreeMap<String, String>,
    },
    Remove {
        path: String,
    },
    Update {
        path: String,
        metadata: BTreeMap<String, String>,
    },
}

impl ReconcileOp {
    pub fn path(&self) -> &str {
        match self {
            ReconcileOp::Add { path, .. }
            | ReconcileOp::Remove { path }
            | ReconcileOp::Update { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReconcileOp::Add { .. } => "add",
            ReconcileOp::Remove { .. } => "remove",
            ReconcileOp::Update { .. } => "update",
        }
    }
}

/// A stateful sink that understands add/remove/update.
pub trait ReconcileSink {
    fn apply(&mut self, op: &ReconcileOp) -> Result<(), SinkFault>;

    /// Whether `Update` means anything to this sink. When it does not, a
    /// metadata-only change of a tracked path is skipped without a call.
    fn supports_update(&self) -> bool {
        true
    }
}

/// Recording sink.
impl ReconcileSink for Vec<ReconcileOp> {
    fn apply(&mut self, op: &ReconcileOp) -> Result<(), SinkFault> {
        self.push(op.clone());
        Ok(())
    }
}

/// Counts of what one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    /// Duplicate or stale notifications that needed no call.
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn merge(&mut self, other: ReconcileSummary) {
        self.added += other.added;
        self.removed += other.removed;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }

    pub fn calls(&self) -> usize {
        self.added + self.removed + self.updated
    }
}

/// Applies diffs to one sink and owns that sink's [`TrackedPathSet`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    project_dir: String,
    identity_properties: BTreeSet<String>,
    tracked: TrackedPathSet,
}

impl Reconciler {
    pub fn new<I, P>(project_dir: impl Into<String>, identity_properties: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            project_dir: project_dir.into(),
            identity_properties: identity_properties.into_iter().map(Into::into).collect(),
            tracked: TrackedPathSet::new(),
        }
    }

    pub fn tracked(&self) -> &TrackedPathSet {
        &self.tracked
    }

    /// Fully-qualified path for an item key.
    ///
    /// A `FullPath` metadata value wins; otherwise the key is resolved
    /// against the project directory.
    pub fn resolve(&self, key: &str, item: Option<&Item>) -> String {
        match item.and_then(|i| i.metadata(FULL_PATH)) {
            Some(full) => paths::canonicalize(full),
            None => paths::resolve(&self.project_dir, key),
        }
    }

    /// Apply `diff` (renames are normalized first) and update the tracked set.
    ///
    /// `before` and `after` supply item metadata for path resolution and
    /// identity checks. On a sink error the failing call leaves the tracked
    /// set untouched, so replaying the same diff resumes where it stopped.
    pub fn apply<S: ReconcileSink + ?Sized>(
        &mut self,
        diff: &ProjectChangeDiff,
        before: &KeyedCollection<Item>,
        after: &KeyedCollection<Item>,
        origin: ChangeOrigin,
        sink: &mut S,
    ) -> Result<ReconcileSummary, SyncError> {
        let diff = if diff.has_renames() {
            Cow::Owned(normalize_renames(diff.clone()))
        } else {
            Cow::Borrowed(diff)
        };
        let mut summary = ReconcileSummary::default();

        for key in &diff.removed {
            let path = self.resolve(key, before.get(key));
            self.remove_if_present(&path, origin, sink, &mut summary)?;
        }

        for key in &diff.changed {
            let old = before.get(key);
            let new = after.get(key);
            let old_path = self.resolve(key, old);
            let new_path = self.resolve(key, new);
            let metadata = new.map(|i| i.metadata.clone()).unwrap_or_default();

            if old_path != new_path || self.identity_changed(old, new) {
                self.remove_if_present(&old_path, origin, sink, &mut summary)?;
                self.add_if_absent(&new_path, metadata, origin, sink, &mut summary)?;
            } else if self.tracked.contains(&new_path) {
                if !sink.supports_update() {
                    tracing::debug!("[{origin}] update {new_path}: not supported, skipping");
                    summary.skipped += 1;
                    continue;
                }
                let op = ReconcileOp::Update {
                    path: new_path,
                    metadata,
                };
                call(sink, &op)?;
                summary.updated += 1;
            } else {
                self.add_if_absent(&new_path, metadata, origin, sink, &mut summary)?;
            }
        }

        for key in &diff.added {
            let item = after.get(key);
            let path = self.resolve(key, item);
            let metadata = item.map(|i| i.metadata.clone()).unwrap_or_default();
            self.add_if_absent(&path, metadata, origin, sink, &mut summary)?;
        }

        Ok(summary)
    }

    fn identity_changed(&self, old: Option<&Item>, new: Option<&Item>) -> bool {
        self.identity_properties.iter().any(|name| {
            old.and_then(|i| i.metadata(name)) != new.and_then(|i| i.metadata(name))
        })
    }

    fn remove_if_present<S: ReconcileSink + ?Sized>(
        &mut self,
        path: &str,
        origin: ChangeOrigin,
        sink: &mut S,
        summary: &mut ReconcileSummary,
    ) -> Result<(), SyncError> {
        if !self.tracked.contains(path) {
            tracing::debug!("[{origin}] remove {path}: not tracked, skipping");
            summary.skipped += 1;
            return Ok(());
        }
        call(
            sink,
            &ReconcileOp::Remove {
                path: path.to_string(),
            },
        )?;
        self.tracked.remove(path);
        summary.removed += 1;
        Ok(())
    }

    fn add_if_absent<S: ReconcileSink + ?Sized>(
        &mut self,
        path: &str,
        metadata: BTreeMap<String, String>,
        origin: ChangeOrigin,
        sink: &mut S,
        summary: &mut ReconcileSummary,
    ) -> Result<(), SyncError> {
        if self.tracked.contains(path) {
            tracing::debug!("[{origin}] add {path}: already tracked, skipping");
            summary.skipped += 1;
            return Ok(());
        }
        call(
            sink,
            &ReconcileOp::Add {
                path: path.to_string(),
                metadata,
            },
        )?;
        self.tracked.insert(path);
        summary.added += 1;
        Ok(())
    }
}

fn call<S: ReconcileSink + ?Sized>(sink: &mut S, op: &ReconcileOp) -> Result<(), SyncError> {
    sink.apply(op).map_err(|source| SyncError::Sink {
        op: op.name(),
        path: op.path().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff, diff_with_renames};

    const DIR: &str = r"C:\Src\App";

    fn reconciler() -> Reconciler {
        Reconciler::new(DIR, ["Link"])
    }

    fn items(names: &[&str]) -> KeyedCollection<Item> {
        names.iter().map(|n| Item::new(*n)).collect()
    }

    fn calls(ops: &[ReconcileOp]) -> Vec<(&'static str, &str)> {
        ops.iter().map(|op| (op.name(), op.path())).collect()
    }

    struct FailingSink;

    impl ReconcileSink for FailingSink {
        fn apply(&mut self, _op: &ReconcileOp) -> Result<(), SinkFault> {
            Err("context disposed".into())
        }
    }

    #[test]
    fn added_keys_are_resolved_and_tracked() {
        let mut r = reconciler();
        let before = items(&[]);
        let after = items(&["Foo.cs", r"..\Shared\Util.cs"]);
        let mut ops = Vec::new();

        let summary = r
            .apply(&diff(&before, &after), &before, &after, ChangeOrigin::Evaluation, &mut ops)
            .expect("apply");

        assert_eq!(summary.added, 2);
        assert!(r.tracked().contains(r"C:\Src\App\Foo.cs"));
        assert!(r.tracked().contains(r"C:\Src\Shared\Util.cs"));
    }

    #[test]
    fn replaying_a_diff_makes_no_calls() {
        let mut r = reconciler();
        let before = items(&["Old.cs"]);
        let after = items(&["New.cs"]);
        let d = diff(&before, &after);

        let mut first = Vec::new();
        r.apply(&d, &before, &after, ChangeOrigin::Evaluation, &mut first)
            .expect("first");
        let tracked_after_first = r.tracked().clone();

        let mut second = Vec::new();
        let summary = r
            .apply(&d, &before, &after, ChangeOrigin::Build, &mut second)
            .expect("second");

        // Old.cs was never tracked, so only the add happens, once.
        assert_eq!(calls(&first), vec![("add", r"C:\Src\App\New.cs")]);
        assert!(second.is_empty());
        assert_eq!(summary.calls(), 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(r.tracked(), &tracked_after_first);
    }

    #[test]
    fn remove_of_untracked_key_is_silent() {
        let mut r = reconciler();
        let before = items(&["Gone.cs"]);
        let after = items(&[]);
        let mut ops = Vec::new();
        let summary = r
            .apply(&diff(&before, &after), &before, &after, ChangeOrigin::Build, &mut ops)
            .expect("apply");
        assert!(ops.is_empty());
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn identity_change_is_replace_not_update() {
        let mut r = reconciler();
        let empty = items(&[]);
        let v1: KeyedCollection<Item> = [Item::new("Foo.cs").with("Link", r"A\Foo.cs")]
            .into_iter()
            .collect();
        let v2: KeyedCollection<Item> = [Item::new("Foo.cs").with("Link", r"B\Foo.cs")]
            .into_iter()
            .collect();

        let mut ops = Vec::new();
        r.apply(&diff(&empty, &v1), &empty, &v1, ChangeOrigin::Evaluation, &mut ops)
            .expect("add");
        ops.clear();

        r.apply(&diff(&v1, &v2), &v1, &v2, ChangeOrigin::Evaluation, &mut ops)
            .expect("change");
        assert_eq!(
            calls(&ops),
            vec![("remove", r"C:\Src\App\Foo.cs"), ("add", r"C:\Src\App\Foo.cs")]
        );
        assert!(r.tracked().contains(r"C:\Src\App\Foo.cs"));
    }

    #[test]
    fn non_identity_change_is_update() {
        let mut r = reconciler();
        let empty = items(&[]);
        let v1: KeyedCollection<Item> = [Item::new("lib.dll").with("Aliases", "global")]
            .into_iter()
            .collect();
        let v2: KeyedCollection<Item> = [Item::new("lib.dll").with("Aliases", "legacy")]
            .into_iter()
            .collect();

        let mut ops = Vec::new();
        r.apply(&diff(&empty, &v1), &empty, &v1, ChangeOrigin::Build, &mut ops)
            .expect("add");
        ops.clear();
        let summary = r
            .apply(&diff(&v1, &v2), &v1, &v2, ChangeOrigin::Build, &mut ops)
            .expect("change");

        assert_eq!(summary.updated, 1);
        assert!(matches!(
            &ops[0],
            ReconcileOp::Update { metadata, .. } if metadata.get("Aliases").map(String::as_str) == Some("legacy")
        ));
    }

    struct PathOnlySink(Vec<ReconcileOp>);

    impl ReconcileSink for PathOnlySink {
        fn apply(&mut self, op: &ReconcileOp) -> Result<(), SinkFault> {
            self.0.push(op.clone());
            Ok(())
        }

        fn supports_update(&self) -> bool {
            false
        }
    }

    #[test]
    fn metadata_change_on_path_only_sink_is_skipped_not_counted() {
        let mut r = reconciler();
        let empty = items(&[]);
        let v1: KeyedCollection<Item> = [Item::new("rules.ruleset").with("Severity", "warn")]
            .into_iter()
            .collect();
        let v2: KeyedCollection<Item> = [Item::new("rules.ruleset").with("Severity", "error")]
            .into_iter()
            .collect();

        let mut sink = PathOnlySink(Vec::new());
        r.apply(&diff(&empty, &v1), &empty, &v1, ChangeOrigin::Evaluation, &mut sink)
            .expect("add");
        let summary = r
            .apply(&diff(&v1, &v2), &v1, &v2, ChangeOrigin::Evaluation, &mut sink)
            .expect("change");

        assert_eq!(calls(&sink.0), vec![("add", r"C:\Src\App\rules.ruleset")]);
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn full_path_metadata_overrides_resolution() {
        let r = reconciler();
        let item = Item::new("ref").with(FULL_PATH, "/nuget/pkg/lib/../lib/x.dll");
        assert_eq!(r.resolve("ref", Some(&item)), "/nuget/pkg/lib/x.dll");
    }

    #[test]
    fn renames_in_diff_are_normalized_before_applying() {
        let mut r = reconciler();
        let empty = items(&[]);
        let v1 = items(&["Foo.cs"]);
        let v2 = items(&["Bar.cs"]);
        let mut ops = Vec::new();
        r.apply(&diff(&empty, &v1), &empty, &v1, ChangeOrigin::Evaluation, &mut ops)
            .expect("add");
        ops.clear();

        let renames = [("Foo.cs".to_string(), "Bar.cs".to_string())]
            .into_iter()
            .collect();
        let d = diff_with_renames(&v1, &v2, &renames);
        assert!(d.has_renames());
        r.apply(&d, &v1, &v2, ChangeOrigin::Evaluation, &mut ops)
            .expect("rename");
        assert_eq!(
            calls(&ops),
            vec![("remove", r"C:\Src\App\Foo.cs"), ("add", r"C:\Src\App\Bar.cs")]
        );
    }

    #[test]
    fn sink_failure_leaves_tracked_set_untouched() {
        let mut r = reconciler();
        let before = items(&[]);
        let after = items(&["Foo.cs"]);
        let err = r
            .apply(
                &diff(&before, &after),
                &before,
                &after,
                ChangeOrigin::Evaluation,
                &mut FailingSink,
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Sink { op: "add", .. }));
        assert!(r.tracked().is_empty());
    }
}
