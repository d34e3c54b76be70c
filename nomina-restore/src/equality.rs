//! Structural equality over restore trees, and nomination suppression.
//!
//! Scalars compare ordinally. Every collection compares as an ordered
//! sequence: the same items in a different order are a different tree, and
//! that tree gets re-nominated. False inequality only costs a redundant
//! restore; false equality would lose one.

use sha2::{Digest, Sha256};

use nomina_core::KeyedCollection;

use crate::tree::{ReferenceItem, ReferenceProperty, RestoreInfoTree, TargetFrameworkInfo};

impl PartialEq for ReferenceProperty {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for ReferenceProperty {}

// `KeyedCollection` equality is element-wise in insertion order.

impl PartialEq for ReferenceItem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.properties == other.properties
    }
}

impl Eq for ReferenceItem {}

impl PartialEq for TargetFrameworkInfo {
    fn eq(&self, other: &Self) -> bool {
        self.target_framework_moniker == other.target_framework_moniker
            && self.properties == other.properties
            && self
                .item_collections()
                .into_iter()
                .zip(other.item_collections())
                .all(|((_, a), (_, b))| a == b)
    }
}

impl Eq for TargetFrameworkInfo {}

impl PartialEq for RestoreInfoTree {
    fn eq(&self, other: &Self) -> bool {
        self.project_path == other.project_path
            && self.base_intermediate_path == other.base_intermediate_path
            && self.original_target_frameworks == other.original_target_frameworks
            && self.target_frameworks == other.target_frameworks
    }
}

impl Eq for RestoreInfoTree {}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// SHA-256 hex digest over every field of the tree, in order.
///
/// Different fingerprints prove inequality. Equal fingerprints still go
/// through the structural comparison.
pub fn fingerprint(tree: &RestoreInfoTree) -> String {
    let mut hasher = Sha256::new();
    feed(&mut hasher, &tree.project_path);
    feed(&mut hasher, &tree.base_intermediate_path);
    feed(&mut hasher, &tree.original_target_frameworks);
    hasher.update((tree.target_frameworks.len() as u64).to_le_bytes());
    for framework in &tree.target_frameworks {
        feed(&mut hasher, &framework.target_framework_moniker);
        feed_properties(&mut hasher, &framework.properties);
        for (label, items) in framework.item_collections() {
            feed(&mut hasher, label);
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed(&mut hasher, &item.name);
                feed_properties(&mut hasher, &item.properties);
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// Length-prefixed so adjacent fields cannot run into each other.
fn feed(hasher: &mut Sha256, text: &str) {
    hasher.update((text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
}

fn feed_properties(hasher: &mut Sha256, properties: &KeyedCollection<ReferenceProperty>) {
    hasher.update((properties.len() as u64).to_le_bytes());
    for property in properties {
        feed(hasher, &property.name);
        feed(hasher, &property.value);
    }
}

// ---------------------------------------------------------------------------
// ChangeSuppressor
// ---------------------------------------------------------------------------

/// Remembers the last tree the sink accepted and filters out equivalent ones.
#[derive(Debug, Default)]
pub struct ChangeSuppressor {
    last: Option<Accepted>,
}

#[derive(Debug)]
struct Accepted {
    fingerprint: String,
    tree: RestoreInfoTree,
}

impl ChangeSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` when `tree` is equivalent to the last accepted tree.
    pub fn should_nominate(&self, tree: &RestoreInfoTree) -> bool {
        match &self.last {
            None => true,
            Some(last) => last.fingerprint != fingerprint(tree) || last.tree != *tree,
        }
    }

    /// Record `tree` as delivered.
    pub fn accept(&mut self, tree: RestoreInfoTree) {
        self.last = Some(Accepted {
            fingerprint: fingerprint(&tree),
            tree,
        });
    }

    pub fn last(&self) -> Option<&RestoreInfoTree> {
        self.last.as_ref().map(|a| &a.tree)
    }

    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last.as_ref().map(|a| a.fingerprint.as_str())
    }

    /// Forget the last tree; the next one is always nominated.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::properties_from;

    fn item(name: &str, version: &str) -> ReferenceItem {
        let props = [("Version".to_string(), version.to_string())].into_iter().collect();
        ReferenceItem::new(name, properties_from(&props))
    }

    fn tree(packages: Vec<ReferenceItem>) -> RestoreInfoTree {
        let mut framework = TargetFrameworkInfo::new("net6.0");
        framework.package_references = packages.into_iter().collect();
        RestoreInfoTree {
            project_path: "/src/app/app.csproj".to_string(),
            base_intermediate_path: "/src/app/obj/".to_string(),
            original_target_frameworks: "net6.0".to_string(),
            target_frameworks: [framework].into_iter().collect(),
        }
    }

    #[test]
    fn identical_trees_are_equal_with_equal_fingerprints() {
        let a = tree(vec![item("Foo", "1.0"), item("Bar", "2.0")]);
        let b = tree(vec![item("Foo", "1.0"), item("Bar", "2.0")]);
        assert_eq!(a, b);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn item_order_matters() {
        let a = tree(vec![item("Foo", "1.0"), item("Bar", "2.0")]);
        let b = tree(vec![item("Bar", "2.0"), item("Foo", "1.0")]);
        assert_ne!(a, b);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn item_names_compare_case_sensitively() {
        let a = tree(vec![item("Foo", "1.0")]);
        let b = tree(vec![item("foo", "1.0")]);
        assert_ne!(a, b);
    }

    #[test]
    fn items_moving_between_collections_change_the_fingerprint() {
        let a = tree(vec![item("Foo", "1.0")]);
        let mut b = tree(Vec::new());
        let mut framework = TargetFrameworkInfo::new("net6.0");
        framework.tool_references = [item("Foo", "1.0")].into_iter().collect();
        b.target_frameworks = [framework].into_iter().collect();
        assert_ne!(a, b);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn suppressor_filters_equivalent_trees_until_reset() {
        let mut suppressor = ChangeSuppressor::new();
        let first = tree(vec![item("Foo", "1.0")]);
        assert!(suppressor.should_nominate(&first));
        suppressor.accept(first.clone());

        assert!(!suppressor.should_nominate(&first));
        assert!(suppressor.should_nominate(&tree(vec![item("Foo", "1.1")])));

        suppressor.reset();
        assert!(suppressor.should_nominate(&first));
        assert!(suppressor.last().is_none());
    }
}
