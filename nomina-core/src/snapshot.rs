//! Rule snapshots published by each configuration.
//!
//! A [`ProjectSnapshot`] bundles one [`RuleSnapshot`] per rule name
//! (`PackageReference`, `Compile`, `NuGetRestore`, ...). Snapshots are
//! immutable once published; a rule the host did not report reads as empty.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::collection::{Keyed, KeyedCollection};
use crate::error::{io_err, CoreError};
use crate::version::{VersionMap, VersionedValue};

/// One evaluated item: its key plus free-form string metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl Keyed for Item {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Properties and items of one rule at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "KeyedCollection::is_empty")]
    pub items: KeyedCollection<Item>,
    /// Old item key → new item key, relative to the previous snapshot of
    /// this rule. Reported by the host when it detects a file move.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub renamed: BTreeMap<String, String>,
}

impl RuleSnapshot {
    /// Shared empty snapshot handed out for rules the host did not report.
    pub fn empty() -> &'static RuleSnapshot {
        static EMPTY: OnceLock<RuleSnapshot> = OnceLock::new();
        EMPTY.get_or_init(RuleSnapshot::default)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Property value, treating missing and blank the same.
    pub fn non_empty_property(&self, name: &str) -> Option<&str> {
        self.property(name).filter(|v| !v.trim().is_empty())
    }
}

/// Every rule snapshot of one configuration, keyed by rule name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectSnapshot {
    rules: BTreeMap<String, RuleSnapshot>,
}

impl ProjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, name: impl Into<String>, rule: RuleSnapshot) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    /// The named rule, or the shared empty snapshot when absent.
    pub fn rule(&self, name: &str) -> &RuleSnapshot {
        self.rules.get(name).unwrap_or_else(|| RuleSnapshot::empty())
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

/// On-disk form of one configuration's snapshot, as read by file-backed sources.
///
/// ```yaml
/// versions:
///   project-generation: 3
///   local:configured-project-version: 12
/// rules:
///   NuGetRestore:
///     properties:
///       TargetFrameworkMoniker: net6.0
///   PackageReference:
///     items:
///       - name: Foo
///         metadata:
///           Version: 1.2.3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub versions: VersionMap,
    #[serde(default)]
    pub rules: ProjectSnapshot,
}

impl SnapshotDocument {
    /// Read and parse a snapshot document.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load every `*.yaml` / `*.yml` document in `dir`, keyed by file stem
    /// (the configuration name), sorted by name.
    pub fn load_dir(dir: &Path) -> Result<Vec<(String, SnapshotDocument)>, CoreError> {
        let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
        let mut docs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_err(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = configuration_name(&path) else {
                continue;
            };
            docs.push((name, Self::load_at(&path)?));
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }

    pub fn into_versioned(self) -> VersionedValue<ProjectSnapshot> {
        VersionedValue::new(self.rules, self.versions)
    }
}

/// Configuration name for a snapshot document path, or `None` if the path is
/// not a YAML file.
pub fn configuration_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !matches!(ext, "yaml" | "yml") {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::well_known;

    #[test]
    fn missing_rule_reads_as_empty() {
        let snapshot = ProjectSnapshot::new();
        let rule = snapshot.rule("PackageReference");
        assert!(rule.items.is_empty());
        assert!(rule.properties.is_empty());
        assert!(!snapshot.has_rule("PackageReference"));
    }

    #[test]
    fn blank_property_is_treated_as_missing() {
        let mut rule = RuleSnapshot::default();
        rule.properties
            .insert("NuGetTargetMoniker".to_string(), "  ".to_string());
        assert_eq!(rule.property("NuGetTargetMoniker"), Some("  "));
        assert_eq!(rule.non_empty_property("NuGetTargetMoniker"), None);
    }

    #[test]
    fn document_parses_versions_and_rules() {
        let yaml = r#"
versions:
  project-generation: 3
  local:configured-project-version: 12
rules:
  NuGetRestore:
    properties:
      TargetFrameworkMoniker: net6.0
  PackageReference:
    items:
      - name: Foo
        metadata:
          Version: 1.2.3
"#;
        let doc: SnapshotDocument = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(doc.versions.get(&well_known::project_generation()), Some(&3));
        assert_eq!(
            doc.versions.get(&well_known::configured_project_version()),
            Some(&12)
        );
        let versioned = doc.into_versioned();
        let packages = versioned.value.rule("PackageReference");
        assert_eq!(
            packages.items.get("Foo").and_then(|i| i.metadata("Version")),
            Some("1.2.3")
        );
    }
}
