//! Pipeline links: long-lived tasks that move values between stages.
//!
//! Every link is a tokio task plus a [`CancellationToken`]. Disposing a link
//! cancels the token and waits for the task to finish, so once `dispose`
//! returns the link holds no channel ends any more.
//!
//! A source link owns the sending half of its join input. When the link
//! stops (disposed, or its publisher went away) that half is dropped and the
//! join observes the source as completed.

use std::pin::pin;

use futures::stream::{self, StreamExt};
use futures_concurrency::stream::Merge;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use nomina_core::VersionedValue;
use nomina_sync::{JoinEvent, JoinedTuple, KeyProjection, SyncJoin};

use crate::error::DaemonError;
use crate::source::SnapshotSource;

/// Capacity of inter-stage channels.
pub const LINK_CAPACITY: usize = 16;

/// Handle to a running link.
#[derive(Debug)]
pub struct LinkHandle {
    name: String,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub fn spawn<F>(name: impl Into<String>, token: CancellationToken, task: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            token,
            task: tokio::spawn(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the link and wait until its task has exited.
    pub async fn dispose(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            tracing::error!(link = %self.name, error = %err, "link task failed");
        }
        tracing::debug!(link = %self.name, "link disposed");
    }
}

// ---------------------------------------------------------------------------
// Source link
// ---------------------------------------------------------------------------

/// Forward every value of `source`, projected, into `out`.
pub fn spawn_source_link<T>(
    mut source: SnapshotSource<T>,
    projection: KeyProjection,
    out: mpsc::Sender<VersionedValue<T>>,
    token: CancellationToken,
) -> LinkHandle
where
    T: Clone + Send + Sync + 'static,
{
    let name = format!("source:{}", source.name());
    let task_token = token.clone();
    let label = name.clone();
    LinkHandle::spawn(name, token, async move {
        loop {
            let value = tokio::select! {
                _ = task_token.cancelled() => break,
                value = source.next() => value,
            };
            let Some(value) = value else {
                tracing::debug!(link = %label, "source completed");
                break;
            };
            let projected = projection.apply(value);
            tokio::select! {
                _ = task_token.cancelled() => break,
                sent = out.send(projected) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Join link
// ---------------------------------------------------------------------------

enum JoinInput<T> {
    Value(usize, VersionedValue<T>),
    Completed(usize),
}

/// Run a [`SyncJoin`] over `inputs` and send every agreed tuple to `out`.
///
/// The link stops when the join completes, when `out` is closed, or when it
/// is disposed.
pub fn spawn_join_link<T>(
    name: impl Into<String>,
    inputs: Vec<mpsc::Receiver<VersionedValue<T>>>,
    out: mpsc::Sender<JoinedTuple<T>>,
    token: CancellationToken,
) -> LinkHandle
where
    T: Clone + Send + 'static,
{
    let name = name.into();
    let task_token = token.clone();
    let label = name.clone();
    LinkHandle::spawn(name, token, async move {
        let mut join = SyncJoin::new(inputs.len());
        let tagged: Vec<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, rx)| {
                ReceiverStream::new(rx)
                    .map(move |value| JoinInput::Value(index, value))
                    .chain(stream::once(async move { JoinInput::Completed(index) }))
                    .boxed()
            })
            .collect();
        let mut merged = pin!(tagged.merge());

        loop {
            let input = tokio::select! {
                _ = task_token.cancelled() => break,
                input = merged.next() => input,
            };
            let step = match input {
                Some(JoinInput::Value(index, value)) => join.push(index, value),
                Some(JoinInput::Completed(index)) => join.complete(index),
                None => break,
            };
            let events = match step {
                Ok(events) => events,
                Err(err) => {
                    let err = DaemonError::from(err);
                    tracing::error!(link = %label, error = %err, "join rejected input");
                    continue;
                }
            };
            for event in events {
                match event {
                    JoinEvent::Tuple(tuple) => {
                        let sent = tokio::select! {
                            _ = task_token.cancelled() => return,
                            sent = out.send(tuple) => sent,
                        };
                        if sent.is_err() {
                            return;
                        }
                    }
                    JoinEvent::Completed { source } => {
                        tracing::info!(link = %label, source, "join completed");
                        return;
                    }
                }
            }
        }
    })
}
