//! Paths already pushed to an external sink.

use std::collections::BTreeSet;

/// Fully-resolved paths one handler has added to its sink.
///
/// Owned by exactly one [`Reconciler`](crate::Reconciler); never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedPathSet {
    paths: BTreeSet<String>,
}

impl TrackedPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// `true` if the path was not tracked before.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(path.into())
    }

    /// `true` if the path was tracked.
    pub fn remove(&mut self, path: &str) -> bool {
        self.paths.remove(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}
