//! File-backed snapshot sources.
//!
//! A directory holds one YAML [`SnapshotDocument`] per configuration
//! (`net6.0.yaml`, `net7.0.yaml`, ...). Each document is published through
//! its own [`SnapshotPublisher`]. Adding or removing a document changes the
//! configuration set and rewires the project scope.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use nomina_core::snapshot::configuration_name;
use nomina_core::{ProjectSnapshot, SnapshotDocument};

use crate::error::DaemonError;
use crate::scope::ProjectScope;
use crate::source::{SnapshotPublisher, SnapshotSource};

/// Quiet period a file must reach before it is read.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

/// Outcome of feeding one changed path.
#[derive(Debug)]
pub enum FeedUpdate {
    /// Not a snapshot document, unreadable, or rejected.
    Ignored,
    /// A known configuration published a new value.
    Published { configuration: String },
    /// A new configuration appeared.
    Added { configuration: String },
    /// A configuration's document disappeared. Drop the publisher only after
    /// the scope has been rewired.
    Removed {
        configuration: String,
        publisher: SnapshotPublisher<ProjectSnapshot>,
    },
}

impl FeedUpdate {
    pub fn changes_configuration_set(&self) -> bool {
        matches!(self, FeedUpdate::Added { .. } | FeedUpdate::Removed { .. })
    }
}

/// Publishers for every snapshot document in one directory.
#[derive(Debug)]
pub struct SnapshotFeed {
    dir: PathBuf,
    publishers: BTreeMap<String, SnapshotPublisher<ProjectSnapshot>>,
}

impl SnapshotFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            publishers: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every document currently in the directory. A malformed document
    /// fails the whole load.
    pub fn load_all(&mut self) -> Result<(), DaemonError> {
        for (configuration, doc) in SnapshotDocument::load_dir(&self.dir)? {
            let publisher = self
                .publishers
                .entry(configuration.clone())
                .or_insert_with(|| SnapshotPublisher::new(configuration));
            publisher.publish(doc.into_versioned())?;
        }
        Ok(())
    }

    pub fn configurations(&self) -> Vec<String> {
        self.publishers.keys().cloned().collect()
    }

    /// One source per configuration, in name order.
    pub fn sources(&self) -> Vec<SnapshotSource<ProjectSnapshot>> {
        self.publishers.values().map(|p| p.subscribe()).collect()
    }

    /// React to a change of `path`. Read failures and version regressions
    /// are logged and ignored; the previous value stays current.
    pub fn handle_path(&mut self, path: &Path) -> FeedUpdate {
        if path.parent() != Some(self.dir.as_path()) {
            return FeedUpdate::Ignored;
        }
        let Some(configuration) = configuration_name(path) else {
            return FeedUpdate::Ignored;
        };

        if !path.is_file() {
            return match self.publishers.remove(&configuration) {
                Some(publisher) => FeedUpdate::Removed {
                    configuration,
                    publisher,
                },
                None => FeedUpdate::Ignored,
            };
        }

        let doc = match SnapshotDocument::load_at(path) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(configuration = %configuration, error = %err, "skipping unreadable snapshot");
                return FeedUpdate::Ignored;
            }
        };

        let added = !self.publishers.contains_key(&configuration);
        let publisher = self
            .publishers
            .entry(configuration.clone())
            .or_insert_with(|| SnapshotPublisher::new(configuration.clone()));
        if let Err(err) = publisher.publish(doc.into_versioned()) {
            tracing::warn!(configuration = %configuration, error = %err, "rejecting snapshot");
            if added {
                self.publishers.remove(&configuration);
            }
            return FeedUpdate::Ignored;
        }
        if added {
            FeedUpdate::Added { configuration }
        } else {
            FeedUpdate::Published { configuration }
        }
    }
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Trailing-edge debounce: a path is released once no event touched it for
/// the whole window.
#[derive(Debug, Default)]
pub struct DebounceQueue {
    pending: HashMap<PathBuf, Instant>,
}

impl DebounceQueue {
    pub fn touch(&mut self, path: &Path, now: Instant) {
        self.pending.insert(path.to_path_buf(), now);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every path quiet for at least `window`, sorted.
    pub fn drain_ready(&mut self, now: Instant, window: Duration) -> Vec<PathBuf> {
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, seen_at)| now.duration_since(**seen_at) >= window)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

// ---------------------------------------------------------------------------
// Watch loop
// ---------------------------------------------------------------------------

/// Watch `feed`'s directory and keep `scope` in step with it until `token`
/// is cancelled.
pub async fn watch_directory(
    mut feed: SnapshotFeed,
    scope: &mut ProjectScope,
    token: CancellationToken,
) -> Result<(), DaemonError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(feed.dir(), RecursiveMode::NonRecursive)?;

    // Event paths arrive canonicalized on some platforms.
    let dir = std::fs::canonicalize(feed.dir()).unwrap_or_else(|_| feed.dir().to_path_buf());
    let mut queue = DebounceQueue::default();
    let mut tick = tokio::time::interval(DEBOUNCE_WINDOW / 2);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(dir = %feed.dir().display(), "watching snapshot directory");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                let now = Instant::now();
                for path in event.paths {
                    if configuration_name(&path).is_some() {
                        queue.touch(&path, now);
                    }
                }
            }
            _ = tick.tick(), if !queue.is_empty() => {
                for path in queue.drain_ready(Instant::now(), DEBOUNCE_WINDOW) {
                    let local = match path.file_name() {
                        Some(name) if path.parent() == Some(dir.as_path()) => feed.dir().join(name),
                        _ => path,
                    };
                    apply_update(&mut feed, scope, &local).await;
                }
            }
        }
    }
    Ok(())
}

async fn apply_update(feed: &mut SnapshotFeed, scope: &mut ProjectScope, path: &Path) {
    match feed.handle_path(path) {
        FeedUpdate::Ignored => {}
        FeedUpdate::Published { configuration } => {
            tracing::debug!(configuration = %configuration, "snapshot published");
        }
        FeedUpdate::Added { configuration } => {
            tracing::info!(configuration = %configuration, "configuration added");
            scope.set_configurations(feed.sources()).await;
        }
        FeedUpdate::Removed {
            configuration,
            publisher,
        } => {
            tracing::info!(configuration = %configuration, "configuration removed");
            scope.set_configurations(feed.sources()).await;
            drop(publisher);
        }
    }
}
