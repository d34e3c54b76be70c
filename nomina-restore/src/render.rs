//! Text renderings of a restore tree and unified diffs between two trees.

use similar::TextDiff;

use crate::error::RestoreError;
use crate::tree::RestoreInfoTree;

pub fn to_yaml(tree: &RestoreInfoTree) -> Result<String, RestoreError> {
    Ok(serde_yaml::to_string(tree)?)
}

pub fn to_json(tree: &RestoreInfoTree) -> Result<String, RestoreError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// A rendered tree diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    pub old_fingerprint: String,
    pub new_fingerprint: String,
    pub unified_diff: String,
}

/// Unified diff of the YAML renderings, or `None` when the trees are
/// structurally equal.
pub fn diff_trees(
    before: &RestoreInfoTree,
    after: &RestoreInfoTree,
    before_label: &str,
    after_label: &str,
) -> Result<Option<TreeDiff>, RestoreError> {
    if before == after {
        return Ok(None);
    }
    let old = to_yaml(before)?;
    let new = to_yaml(after)?;
    let unified_diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(before_label, after_label)
        .context_radius(3)
        .to_string();
    Ok(Some(TreeDiff {
        old_fingerprint: crate::fingerprint(before),
        new_fingerprint: crate::fingerprint(after),
        unified_diff,
    }))
}
