//! Diff two snapshots of a keyed collection and fold renames.

use std::collections::BTreeMap;

use nomina_core::{Keyed, KeyedCollection, ProjectChangeDiff};

/// Classify every key of `before` ∪ `after`.
///
/// Present only in `before` → removed; only in `after` → added; in both with
/// different content → changed. Unchanged keys are left out.
pub fn diff<T: Keyed + PartialEq>(
    before: &KeyedCollection<T>,
    after: &KeyedCollection<T>,
) -> ProjectChangeDiff {
    let mut out = ProjectChangeDiff::default();
    for item in before {
        match after.get(item.key()) {
            None => {
                out.removed.insert(item.key().to_string());
            }
            Some(next) if next != item => {
                out.changed.insert(item.key().to_string());
            }
            Some(_) => {}
        }
    }
    for item in after {
        if !before.contains_key(item.key()) {
            out.added.insert(item.key().to_string());
        }
    }
    out
}

/// [`diff`], then attach host-reported renames.
///
/// A pair is honoured only when it describes what the snapshots show: the old
/// key vanished and the new key appeared. Both then leave `removed`/`added`
/// and move to `renamed`. Other pairs are ignored.
pub fn diff_with_renames<T: Keyed + PartialEq>(
    before: &KeyedCollection<T>,
    after: &KeyedCollection<T>,
    renames: &BTreeMap<String, String>,
) -> ProjectChangeDiff {
    let mut out = diff(before, after);
    for (old, new) in renames {
        if old == new {
            continue;
        }
        if out.removed.contains(old) && out.added.contains(new) {
            out.removed.remove(old);
            out.added.remove(new);
            out.renamed.insert(old.clone(), new.clone());
        } else {
            tracing::debug!("ignoring rename {old} -> {new}: not reflected in snapshots");
        }
    }
    out
}

/// Fold every rename into added(new) + removed(old).
///
/// Returns a diff with an empty `renamed` map. Malformed input where a rename
/// endpoint already sits in another bucket still yields a consistent diff:
/// an old key that was itself just added cancels out, and a new key that was
/// also reported removed becomes a change.
pub fn normalize_renames(mut diff: ProjectChangeDiff) -> ProjectChangeDiff {
    let renamed = std::mem::take(&mut diff.renamed);
    for (old, new) in renamed {
        if !diff.added.remove(&old) {
            diff.changed.remove(&old);
            diff.removed.insert(old);
        }

        if diff.removed.remove(&new) {
            diff.changed.insert(new);
        } else if !diff.changed.contains(&new) {
            diff.added.insert(new);
        }
    }
    diff
}
