//! Change diff between two snapshots of a keyed collection.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Classification of a single key in a [`ProjectChangeDiff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
    Unchanged,
}

/// Added / removed / changed / renamed keys between two snapshots.
///
/// A key sits in at most one of `added`, `removed`, `changed`; rename pairs
/// stay disjoint from all three until normalized away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectChangeDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub changed: BTreeSet<String>,
    /// Old key → new key, as reported by the host.
    pub renamed: BTreeMap<String, String>,
}

impl ProjectChangeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.renamed.is_empty()
    }

    pub fn has_renames(&self) -> bool {
        !self.renamed.is_empty()
    }

    /// Where `key` landed. Rename endpoints report as `Unchanged` here;
    /// normalize first to classify them.
    pub fn classify(&self, key: &str) -> ChangeKind {
        if self.added.contains(key) {
            ChangeKind::Added
        } else if self.removed.contains(key) {
            ChangeKind::Removed
        } else if self.changed.contains(key) {
            ChangeKind::Changed
        } else {
            ChangeKind::Unchanged
        }
    }

    /// Check the disjointness invariant.
    pub fn is_consistent(&self) -> bool {
        let sets = [&self.added, &self.removed, &self.changed];
        for (i, a) in sets.iter().enumerate() {
            for b in sets.iter().skip(i + 1) {
                if !a.is_disjoint(b) {
                    return false;
                }
            }
        }
        self.renamed.iter().all(|(old, new)| {
            sets.iter()
                .all(|set| !set.contains(old) && !set.contains(new))
        })
    }

    /// Number of keys touched, renames counted once.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len() + self.renamed.len()
    }
}
