//! Nomination dispatcher: debounced, cancellable delivery of restore trees.
//!
//! - A newer tree replaces one still waiting out the debounce window.
//! - At most one nomination is in flight. The sink call is never raced
//!   against cancellation; the sink receives a child token and decides itself.
//! - A tree equivalent to the last delivered one is suppressed.
//! - Sink failures are recorded in the project's [`FaultTracker`].
//!   Cancellation is not a failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use nomina_restore::{fingerprint, ChangeSuppressor, RestoreInfoTree};
use nomina_sync::error::SinkFault;

use crate::faults::FaultTracker;
use crate::link::LinkHandle;

/// External package-restore service.
#[async_trait]
pub trait RestoreSink: Send + Sync {
    async fn nominate(
        &self,
        project_path: &str,
        tree: &RestoreInfoTree,
        cancel: CancellationToken,
    ) -> Result<(), SinkFault>;
}

/// How one nomination attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum NominationOutcome {
    Delivered,
    /// Equivalent to the last delivered tree.
    Suppressed,
    /// Dropped because the project went away.
    Cancelled,
    Failed(String),
}

impl NominationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            NominationOutcome::Delivered => "delivered",
            NominationOutcome::Suppressed => "suppressed",
            NominationOutcome::Cancelled => "cancelled",
            NominationOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NominationRecord {
    pub at: DateTime<Utc>,
    pub outcome: NominationOutcome,
    pub fingerprint: String,
    pub frameworks: usize,
    pub items: usize,
}

type History = Arc<RwLock<Vec<NominationRecord>>>;

/// Cloneable handle used by upstream stages to submit trees.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: Arc<watch::Sender<Option<RestoreInfoTree>>>,
}

impl DispatchSender {
    /// Queue `tree`, replacing any tree not yet picked up.
    pub fn submit(&self, tree: RestoreInfoTree) {
        self.tx.send_replace(Some(tree));
    }
}

/// Owns the delivery task for one project.
#[derive(Debug)]
pub struct NominationDispatcher {
    sender: DispatchSender,
    history: History,
    link: LinkHandle,
}

impl NominationDispatcher {
    pub fn spawn(
        project_path: impl Into<String>,
        debounce: Duration,
        sink: Arc<dyn RestoreSink>,
        faults: FaultTracker,
        token: CancellationToken,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let history: History = Arc::new(RwLock::new(Vec::new()));
        let task = DispatchTask {
            project_path: project_path.into(),
            debounce,
            sink,
            faults,
            history: history.clone(),
            rx,
            token: token.clone(),
        };
        Self {
            sender: DispatchSender { tx: Arc::new(tx) },
            history,
            link: LinkHandle::spawn("dispatcher", token, task.run()),
        }
    }

    pub fn sender(&self) -> DispatchSender {
        self.sender.clone()
    }

    pub fn submit(&self, tree: RestoreInfoTree) {
        self.sender.submit(tree);
    }

    /// Drop a tree still waiting out the debounce window. A nomination
    /// already handed to the sink is not affected.
    pub fn discard_pending(&self) {
        if self.sender.tx.send_replace(None).is_some() {
            tracing::debug!("pending nomination discarded");
        }
    }

    pub async fn history(&self) -> Vec<NominationRecord> {
        self.history.read().await.clone()
    }

    /// Stop the dispatcher. A tree still waiting out the debounce window is
    /// dropped as [`NominationOutcome::Cancelled`]; an accepted nomination
    /// runs to completion first.
    pub async fn dispose(self) -> Vec<NominationRecord> {
        self.link.dispose().await;
        let history = self.history.read().await.clone();
        history
    }
}

struct DispatchTask {
    project_path: String,
    debounce: Duration,
    sink: Arc<dyn RestoreSink>,
    faults: FaultTracker,
    history: History,
    rx: watch::Receiver<Option<RestoreInfoTree>>,
    token: CancellationToken,
}

impl DispatchTask {
    async fn run(mut self) {
        let mut suppressor = ChangeSuppressor::new();
        loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }

            // Restart the window on every newer tree.
            loop {
                tokio::select! {
                    _ = self.token.cancelled() => {
                        let pending = self.rx.borrow_and_update().clone();
                        if let Some(tree) = pending {
                            self.record(&tree, NominationOutcome::Cancelled).await;
                        }
                        return;
                    }
                    _ = tokio::time::sleep(self.debounce) => break,
                    changed = self.rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            let Some(tree) = self.rx.borrow_and_update().clone() else {
                continue;
            };
            if !suppressor.should_nominate(&tree) {
                self.record(&tree, NominationOutcome::Suppressed).await;
                continue;
            }

            let result = self
                .sink
                .nominate(&self.project_path, &tree, self.token.child_token())
                .await;
            match result {
                Ok(()) => {
                    self.record(&tree, NominationOutcome::Delivered).await;
                    suppressor.accept(tree);
                }
                Err(_) if self.token.is_cancelled() => {
                    self.record(&tree, NominationOutcome::Cancelled).await;
                }
                Err(err) => {
                    let message = err.to_string();
                    self.faults.record("nominate", message.clone()).await;
                    self.record(&tree, NominationOutcome::Failed(message)).await;
                }
            }
        }
    }

    async fn record(&self, tree: &RestoreInfoTree, outcome: NominationOutcome) {
        let record = NominationRecord {
            at: Utc::now(),
            fingerprint: fingerprint(tree),
            frameworks: tree.target_frameworks.len(),
            items: tree.item_count(),
            outcome,
        };
        tracing::info!(
            project = %self.project_path,
            outcome = record.outcome.label(),
            fingerprint = %&record.fingerprint[..12],
            "nomination",
        );
        self.history.write().await.push(record);
    }
}
