//! Project-scoped fault tracking.
//!
//! Sink failures never crash the pipeline. They are recorded here, against
//! the owning project, and surface when the project reports its state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// One asynchronous failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub at: DateTime<Utc>,
    /// Stage that failed, e.g. `nominate` or `compile:net6.0`.
    pub stage: String,
    pub message: String,
}

/// Shared, append-only list of faults for one project.
#[derive(Debug, Clone)]
pub struct FaultTracker {
    project: Arc<str>,
    faults: Arc<RwLock<Vec<Fault>>>,
}

impl FaultTracker {
    pub fn new(project: &str) -> Self {
        Self {
            project: Arc::from(project),
            faults: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn record(&self, stage: impl Into<String>, message: impl Into<String>) {
        let fault = Fault {
            at: Utc::now(),
            stage: stage.into(),
            message: message.into(),
        };
        tracing::error!(
            project = %self.project,
            stage = %fault.stage,
            error = %fault.message,
            "pipeline fault",
        );
        self.faults.write().await.push(fault);
    }

    pub async fn faults(&self) -> Vec<Fault> {
        self.faults.read().await.clone()
    }

    pub async fn is_faulted(&self) -> bool {
        !self.faults.read().await.is_empty()
    }
}
