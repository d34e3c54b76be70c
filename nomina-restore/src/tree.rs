//! Restore-info tree handed to the package-restore sink.
//!
//! Rebuilt wholesale for every joined tuple and never mutated afterwards.
//! Equality lives in [`crate::equality`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use nomina_core::{Keyed, KeyedCollection};

/// A name/value pair on a framework or reference item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceProperty {
    pub name: String,
    pub value: String,
}

impl ReferenceProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Keyed for ReferenceProperty {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Build a property collection from a sorted map.
pub fn properties_from(map: &BTreeMap<String, String>) -> KeyedCollection<ReferenceProperty> {
    map.iter()
        .map(|(name, value)| ReferenceProperty::new(name.clone(), value.clone()))
        .collect()
}

/// One package/project/tool/framework reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub name: String,
    #[serde(default)]
    pub properties: KeyedCollection<ReferenceProperty>,
}

impl ReferenceItem {
    pub fn new(name: impl Into<String>, properties: KeyedCollection<ReferenceProperty>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.value.as_str())
    }
}

impl Keyed for ReferenceItem {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Restore inputs of one target framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFrameworkInfo {
    pub target_framework_moniker: String,
    #[serde(default)]
    pub properties: KeyedCollection<ReferenceProperty>,
    #[serde(default)]
    pub framework_references: KeyedCollection<ReferenceItem>,
    #[serde(default)]
    pub package_downloads: KeyedCollection<ReferenceItem>,
    #[serde(default)]
    pub project_references: KeyedCollection<ReferenceItem>,
    #[serde(default)]
    pub package_references: KeyedCollection<ReferenceItem>,
    #[serde(default)]
    pub tool_references: KeyedCollection<ReferenceItem>,
    #[serde(default)]
    pub central_package_versions: KeyedCollection<ReferenceItem>,
}

impl TargetFrameworkInfo {
    pub fn new(moniker: impl Into<String>) -> Self {
        Self {
            target_framework_moniker: moniker.into(),
            properties: KeyedCollection::new(),
            framework_references: KeyedCollection::new(),
            package_downloads: KeyedCollection::new(),
            project_references: KeyedCollection::new(),
            package_references: KeyedCollection::new(),
            tool_references: KeyedCollection::new(),
            central_package_versions: KeyedCollection::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.value.as_str())
    }

    /// The item collections in a fixed order, labelled.
    pub fn item_collections(&self) -> [(&'static str, &KeyedCollection<ReferenceItem>); 6] {
        [
            ("framework_references", &self.framework_references),
            ("package_downloads", &self.package_downloads),
            ("project_references", &self.project_references),
            ("package_references", &self.package_references),
            ("tool_references", &self.tool_references),
            ("central_package_versions", &self.central_package_versions),
        ]
    }
}

impl Keyed for TargetFrameworkInfo {
    fn key(&self) -> &str {
        &self.target_framework_moniker
    }
}

/// Project-level root of the restore projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreInfoTree {
    pub project_path: String,
    /// Shared intermediate output path (`MSBuildProjectExtensionsPath`).
    pub base_intermediate_path: String,
    /// The project's `TargetFrameworks` text as written.
    #[serde(default)]
    pub original_target_frameworks: String,
    #[serde(default)]
    pub target_frameworks: KeyedCollection<TargetFrameworkInfo>,
}

impl RestoreInfoTree {
    pub fn framework(&self, moniker: &str) -> Option<&TargetFrameworkInfo> {
        self.target_frameworks.get(moniker)
    }

    /// Total number of reference items across every framework.
    pub fn item_count(&self) -> usize {
        self.target_frameworks
            .iter()
            .flat_map(|f| f.item_collections())
            .map(|(_, items)| items.len())
            .sum()
    }
}
