//! Per-configuration snapshot sources.
//!
//! A [`SnapshotPublisher`] is the producing end. It holds only the latest
//! value (a `watch` channel), so a slow consumer skips straight to the newest
//! snapshot, and it refuses values whose versions move backwards. Dropping
//! the publisher completes every [`SnapshotSource`] subscribed to it.

use tokio::sync::watch;

use nomina_core::version::check_monotonic;
use nomina_core::{VersionMap, VersionedValue};

use crate::DaemonError;

type Slot<T> = Option<VersionedValue<T>>;

/// Producing end of one source.
#[derive(Debug)]
pub struct SnapshotPublisher<T> {
    name: String,
    tx: watch::Sender<Slot<T>>,
    last: VersionMap,
    published: u64,
}

/// Consuming end of one source. Cheap to clone; every clone sees the latest
/// value.
#[derive(Debug, Clone)]
pub struct SnapshotSource<T> {
    name: String,
    rx: watch::Receiver<Slot<T>>,
    primed: bool,
}

impl<T> SnapshotPublisher<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            name: name.into(),
            tx,
            last: VersionMap::new(),
            published: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of values accepted so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn subscribe(&self) -> SnapshotSource<T> {
        SnapshotSource {
            name: self.name.clone(),
            rx: self.tx.subscribe(),
            primed: false,
        }
    }

    /// Publish a new value, replacing whatever subscribers have not yet seen.
    pub fn publish(&mut self, value: VersionedValue<T>) -> Result<(), DaemonError> {
        check_monotonic(&self.last, &value.versions)?;
        self.last.extend(value.versions.iter().map(|(k, v)| (k.clone(), *v)));
        self.published += 1;
        // No receivers is fine: a subscriber created later still sees this value.
        self.tx.send_replace(Some(value));
        Ok(())
    }
}

impl<T: Clone> SnapshotSource<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next unseen value. `None` once the publisher is gone.
    ///
    /// The first call returns the current value, if any, so a source
    /// subscribed after a publish still starts from it.
    pub async fn next(&mut self) -> Option<VersionedValue<T>> {
        if !self.primed {
            self.primed = true;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
        }
        loop {
            self.rx.changed().await.ok()?;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
        }
    }
}
