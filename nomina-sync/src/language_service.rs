//! Per-configuration language-service updates.
//!
//! Each configuration owns one [`ConfigurationContext`]. It keeps the
//! previous evaluation and build snapshots, diffs the new ones rule by rule,
//! and drives one [`Reconciler`] per handler kind against a
//! [`LanguageServiceSink`]. Evaluation changes are applied before build
//! changes.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use nomina_core::{ProjectSnapshot, RuleSnapshot};

use crate::diff::diff_with_renames;
use crate::error::{SinkFault, SyncError};
use crate::reconcile::{ChangeOrigin, ReconcileOp, ReconcileSink, ReconcileSummary, Reconciler};
use crate::tracked::TrackedPathSet;

// ---------------------------------------------------------------------------
// Handler kinds
// ---------------------------------------------------------------------------

/// One kind of compiler input, each with its own tracked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HandlerKind {
    SourceFiles,
    MetadataReferences,
    AnalyzerReferences,
    AdditionalFiles,
    DynamicFiles,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 5] = [
        HandlerKind::SourceFiles,
        HandlerKind::MetadataReferences,
        HandlerKind::AnalyzerReferences,
        HandlerKind::AdditionalFiles,
        HandlerKind::DynamicFiles,
    ];

    /// Rule this handler reads for the given notification, if any.
    pub fn rule(self, origin: ChangeOrigin) -> Option<&'static str> {
        match (self, origin) {
            (HandlerKind::SourceFiles, ChangeOrigin::Evaluation) => Some("Compile"),
            (HandlerKind::SourceFiles, ChangeOrigin::Build) => Some("CompileCommandLine"),
            (HandlerKind::MetadataReferences, ChangeOrigin::Evaluation) => None,
            (HandlerKind::MetadataReferences, ChangeOrigin::Build) => {
                Some("ResolvedCompilationReference")
            }
            (HandlerKind::AnalyzerReferences, ChangeOrigin::Evaluation) => Some("Analyzer"),
            (HandlerKind::AnalyzerReferences, ChangeOrigin::Build) => {
                Some("ResolvedAnalyzerReference")
            }
            (HandlerKind::AdditionalFiles, ChangeOrigin::Evaluation) => Some("AdditionalFiles"),
            (HandlerKind::AdditionalFiles, ChangeOrigin::Build) => Some("ResolvedAdditionalFiles"),
            (HandlerKind::DynamicFiles, ChangeOrigin::Evaluation) => Some("DynamicFiles"),
            (HandlerKind::DynamicFiles, ChangeOrigin::Build) => None,
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandlerKind::SourceFiles => "source-files",
            HandlerKind::MetadataReferences => "metadata-references",
            HandlerKind::AnalyzerReferences => "analyzer-references",
            HandlerKind::AdditionalFiles => "additional-files",
            HandlerKind::DynamicFiles => "dynamic-files",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Compiler-side context for one configuration.
pub trait LanguageServiceSink {
    fn add_source_file(
        &mut self,
        path: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), SinkFault>;
    fn remove_source_file(&mut self, path: &str) -> Result<(), SinkFault>;

    /// Metadata changed without an identity change. Defaults to remove + add.
    fn update_source_file(
        &mut self,
        path: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), SinkFault> {
        self.remove_source_file(path)?;
        self.add_source_file(path, metadata)
    }

    fn add_metadata_reference(
        &mut self,
        path: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), SinkFault>;
    fn remove_metadata_reference(&mut self, path: &str) -> Result<(), SinkFault>;

    fn add_analyzer_reference(&mut self, path: &str) -> Result<(), SinkFault>;
    fn remove_analyzer_reference(&mut self, path: &str) -> Result<(), SinkFault>;

    fn add_additional_file(&mut self, path: &str) -> Result<(), SinkFault>;
    fn remove_additional_file(&mut self, path: &str) -> Result<(), SinkFault>;

    fn add_dynamic_file(&mut self, path: &str) -> Result<(), SinkFault>;
    fn remove_dynamic_file(&mut self, path: &str) -> Result<(), SinkFault>;
}

/// Routes generic reconcile ops to the handler-specific sink methods.
struct HandlerSink<'a, S: ?Sized> {
    kind: HandlerKind,
    sink: &'a mut S,
}

impl<S: LanguageServiceSink + ?Sized> ReconcileSink for HandlerSink<'_, S> {
    fn apply(&mut self, op: &ReconcileOp) -> Result<(), SinkFault> {
        let sink = &mut *self.sink;
        match (self.kind, op) {
            (HandlerKind::SourceFiles, ReconcileOp::Add { path, metadata }) => {
                sink.add_source_file(path, metadata)
            }
            (HandlerKind::SourceFiles, ReconcileOp::Remove { path }) => sink.remove_source_file(path),
            (HandlerKind::SourceFiles, ReconcileOp::Update { path, metadata }) => {
                sink.update_source_file(path, metadata)
            }

            (HandlerKind::MetadataReferences, ReconcileOp::Add { path, metadata }) => {
                sink.add_metadata_reference(path, metadata)
            }
            (HandlerKind::MetadataReferences, ReconcileOp::Remove { path }) => {
                sink.remove_metadata_reference(path)
            }
            // Aliases and embed-interop flags are fixed at add time.
            (HandlerKind::MetadataReferences, ReconcileOp::Update { path, metadata }) => {
                sink.remove_metadata_reference(path)?;
                sink.add_metadata_reference(path, metadata)
            }

            (HandlerKind::AnalyzerReferences, ReconcileOp::Add { path, .. }) => {
                sink.add_analyzer_reference(path)
            }
            (HandlerKind::AnalyzerReferences, ReconcileOp::Remove { path }) => {
                sink.remove_analyzer_reference(path)
            }

            (HandlerKind::AdditionalFiles, ReconcileOp::Add { path, .. }) => {
                sink.add_additional_file(path)
            }
            (HandlerKind::AdditionalFiles, ReconcileOp::Remove { path }) => {
                sink.remove_additional_file(path)
            }

            (HandlerKind::DynamicFiles, ReconcileOp::Add { path, .. }) => sink.add_dynamic_file(path),
            (HandlerKind::DynamicFiles, ReconcileOp::Remove { path }) => {
                sink.remove_dynamic_file(path)
            }

            // Path-only handlers report no update support, so the
            // reconciler never sends them one.
            (_, ReconcileOp::Update { .. }) => Ok(()),
        }
    }

    fn supports_update(&self) -> bool {
        matches!(
            self.kind,
            HandlerKind::SourceFiles | HandlerKind::MetadataReferences
        )
    }
}

// ---------------------------------------------------------------------------
// Configuration context
// ---------------------------------------------------------------------------

/// Language-service state for one configuration.
#[derive(Debug)]
pub struct ConfigurationContext {
    configuration: String,
    handlers: Vec<(HandlerKind, Reconciler)>,
    previous_evaluation: Option<ProjectSnapshot>,
    previous_build: Option<ProjectSnapshot>,
}

impl ConfigurationContext {
    pub fn new(
        configuration: impl Into<String>,
        project_dir: &str,
        identity_properties: &[String],
    ) -> Self {
        let handlers = HandlerKind::ALL
            .iter()
            .map(|&kind| {
                (
                    kind,
                    Reconciler::new(project_dir, identity_properties.iter().cloned()),
                )
            })
            .collect();
        Self {
            configuration: configuration.into(),
            handlers,
            previous_evaluation: None,
            previous_build: None,
        }
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn tracked(&self, kind: HandlerKind) -> Option<&TrackedPathSet> {
        self.handlers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r.tracked())
    }

    /// Apply one joined (evaluation, build) pair: evaluation first.
    pub fn apply_update<S: LanguageServiceSink + ?Sized>(
        &mut self,
        evaluation: &ProjectSnapshot,
        build: &ProjectSnapshot,
        sink: &mut S,
    ) -> Result<ReconcileSummary, SyncError> {
        let mut summary = self.apply(ChangeOrigin::Evaluation, evaluation, sink)?;
        summary.merge(self.apply(ChangeOrigin::Build, build, sink)?);
        Ok(summary)
    }

    /// Diff `snapshot` against the previous one of the same origin and
    /// reconcile every handler.
    ///
    /// The previous snapshot is only replaced on success, so a retry after a
    /// sink error diffs against the same baseline; the tracked sets skip what
    /// already went through.
    pub fn apply<S: LanguageServiceSink + ?Sized>(
        &mut self,
        origin: ChangeOrigin,
        snapshot: &ProjectSnapshot,
        sink: &mut S,
    ) -> Result<ReconcileSummary, SyncError> {
        let previous = match origin {
            ChangeOrigin::Evaluation => self.previous_evaluation.as_ref(),
            ChangeOrigin::Build => self.previous_build.as_ref(),
        };
        let mut summary = ReconcileSummary::default();

        for (kind, reconciler) in &mut self.handlers {
            let Some(rule) = kind.rule(origin) else {
                continue;
            };
            let before = match previous {
                Some(p) => p.rule(rule),
                None => RuleSnapshot::empty(),
            };
            let after = snapshot.rule(rule);
            let diff = diff_with_renames(&before.items, &after.items, &after.renamed);
            if diff.is_empty() {
                continue;
            }
            tracing::debug!(
                "[{}] {origin} {kind}: {} changes",
                self.configuration,
                diff.len()
            );
            let mut adapter = HandlerSink {
                kind: *kind,
                sink: &mut *sink,
            };
            summary.merge(reconciler.apply(
                &diff,
                &before.items,
                &after.items,
                origin,
                &mut adapter,
            )?);
        }

        match origin {
            ChangeOrigin::Evaluation => self.previous_evaluation = Some(snapshot.clone()),
            ChangeOrigin::Build => self.previous_build = Some(snapshot.clone()),
        }
        Ok(summary)
    }
}
