//! Multi-source sync join.
//!
//! Each source keeps its latest value in a one-slot buffer. Whenever a value
//! arrives, the join checks whether every source's buffered version map agrees
//! pairwise with every other on the keys they share. Only then does it emit a
//! [`JoinedTuple`]; otherwise it keeps waiting.
//!
//! Emitting marks the buffered values as delivered but keeps them, so a source
//! that republishes at the agreed version (only its local keys moved) joins the
//! other sources' current values again.
//!
//! There is no timeout. A source that completes is drained: an undelivered
//! buffered value may still take part in one more tuple, after which the join
//! reports [`JoinEvent::Completed`] and accepts nothing further.

use nomina_core::{versions_agree, VersionMap, VersionedValue};

use crate::SyncError;

/// One value from every source, all at the same version frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedTuple<T> {
    /// Values in source-index order.
    pub values: Vec<T>,
    /// Union of the agreeing version maps.
    pub versions: VersionMap,
}

/// Output of a join step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinEvent<T> {
    Tuple(JoinedTuple<T>),
    /// No further tuples will be produced.
    Completed { source: usize },
}

#[derive(Debug)]
struct Slot<T> {
    latest: Option<VersionedValue<T>>,
    /// `latest` has not been part of an emitted tuple yet.
    fresh: bool,
    finished: bool,
}

/// Join state machine over a fixed number of sources.
///
/// Adding or removing a source means building a new join.
#[derive(Debug)]
pub struct SyncJoin<T> {
    slots: Vec<Slot<T>>,
    completed: bool,
    emitted: u64,
}

impl<T: Clone> SyncJoin<T> {
    pub fn new(sources: usize) -> Self {
        Self {
            slots: (0..sources)
                .map(|_| Slot {
                    latest: None,
                    fresh: false,
                    finished: false,
                })
                .collect(),
            completed: false,
            emitted: 0,
        }
    }

    pub fn sources(&self) -> usize {
        self.slots.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Number of tuples emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Indices of sources that have not published anything yet.
    pub fn waiting_on(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.latest.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Buffer a value from `source`, replacing any older buffered value.
    pub fn push(
        &mut self,
        source: usize,
        value: VersionedValue<T>,
    ) -> Result<Vec<JoinEvent<T>>, SyncError> {
        self.check_index(source)?;
        if self.completed {
            return Ok(Vec::new());
        }
        let slot = &mut self.slots[source];
        if slot.finished {
            return Err(SyncError::SourceCompleted(source));
        }
        slot.latest = Some(value);
        slot.fresh = true;
        Ok(self.drain())
    }

    /// Signal that `source` will publish nothing more.
    pub fn complete(&mut self, source: usize) -> Result<Vec<JoinEvent<T>>, SyncError> {
        self.check_index(source)?;
        if self.completed {
            return Ok(Vec::new());
        }
        self.slots[source].finished = true;
        Ok(self.drain())
    }

    fn check_index(&self, index: usize) -> Result<(), SyncError> {
        if index >= self.slots.len() {
            return Err(SyncError::SourceOutOfRange {
                index,
                sources: self.slots.len(),
            });
        }
        Ok(())
    }

    fn drain(&mut self) -> Vec<JoinEvent<T>> {
        let mut events = Vec::new();

        if self.slots.iter().any(|slot| slot.fresh) && self.all_agree() {
            let mut values = Vec::with_capacity(self.slots.len());
            let mut versions = VersionMap::new();
            for slot in &mut self.slots {
                if let Some(latest) = &slot.latest {
                    versions.extend(latest.versions.iter().map(|(k, v)| (k.clone(), *v)));
                    values.push(latest.value.clone());
                }
                slot.fresh = false;
            }
            self.emitted += 1;
            tracing::info!(
                "join emitted tuple #{} across {} sources",
                self.emitted,
                values.len()
            );
            events.push(JoinEvent::Tuple(JoinedTuple { values, versions }));
        }

        if let Some(source) = self.exhausted_source() {
            self.completed = true;
            for slot in &mut self.slots {
                slot.latest = None;
                slot.fresh = false;
            }
            tracing::info!("join completed: source {source} finished");
            events.push(JoinEvent::Completed { source });
        }

        events
    }

    fn all_agree(&self) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        let mut heads = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match &slot.latest {
                Some(latest) => heads.push(&latest.versions),
                None => return false,
            }
        }
        heads.iter().enumerate().all(|(i, a)| {
            heads
                .iter()
                .skip(i + 1)
                .all(|b| versions_agree(a, b))
        })
    }

    /// A finished source with nothing left to deliver: its buffer is empty,
    /// its last value was already emitted, or that value is behind another
    /// source on a shared key.
    fn exhausted_source(&self) -> Option<usize> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            if !slot.finished {
                return None;
            }
            match &slot.latest {
                None => Some(i),
                Some(_) if !slot.fresh => Some(i),
                Some(latest) if self.is_behind(&latest.versions) => Some(i),
                Some(_) => None,
            }
        })
    }

    fn is_behind(&self, versions: &VersionMap) -> bool {
        self.slots
            .iter()
            .filter_map(|slot| slot.latest.as_ref())
            .any(|other| {
                versions.iter().any(|(key, &version)| {
                    other.versions.get(key).is_some_and(|&v| v > version)
                })
            })
    }
}
