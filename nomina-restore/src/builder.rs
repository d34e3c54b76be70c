//! Fold per-configuration rule snapshots into a [`RestoreInfoTree`].

use std::collections::BTreeMap;

use nomina_core::{paths, KeyedCollection, ProjectSnapshot, RuleSnapshot};

use crate::tree::{properties_from, ReferenceItem, RestoreInfoTree, TargetFrameworkInfo};

/// Rule names read by the builder.
pub mod rules {
    pub const NUGET_RESTORE: &str = "NuGetRestore";
    pub const PACKAGE_REFERENCE: &str = "PackageReference";
    pub const PROJECT_REFERENCE: &str = "ProjectReference";
    pub const TOOL_REFERENCE: &str = "DotNetCliToolReference";
    pub const FRAMEWORK_REFERENCE: &str = "CollectedFrameworkReference";
    pub const PACKAGE_DOWNLOAD: &str = "CollectedPackageDownload";
    pub const PACKAGE_VERSION: &str = "CollectedPackageVersion";
}

/// Properties of the `NuGetRestore` rule the builder interprets.
pub mod properties {
    pub const PROJECT_EXTENSIONS_PATH: &str = "MSBuildProjectExtensionsPath";
    pub const TARGET_FRAMEWORKS: &str = "TargetFrameworks";
    pub const NUGET_TARGET_MONIKER: &str = "NuGetTargetMoniker";
    pub const TARGET_FRAMEWORK_MONIKER: &str = "TargetFrameworkMoniker";
    /// Item metadata: directory the project reference was declared in.
    pub const DEFINING_PROJECT_DIRECTORY: &str = "DefiningProjectDirectory";
    /// Synthesized on project references.
    pub const PROJECT_FILE_FULL_PATH: &str = "ProjectFileFullPath";
}

/// Build the restore tree for `project_path` from one snapshot per
/// configuration.
///
/// Project-wide values (intermediate path, original target frameworks) come
/// from the first configuration that reports them. Configurations whose
/// moniker was already seen are dropped; the first one wins.
pub fn build<'a, I>(project_path: &str, configurations: I) -> RestoreInfoTree
where
    I: IntoIterator<Item = &'a ProjectSnapshot>,
{
    let project_dir = paths::directory_name(project_path);
    let mut base_intermediate_path = None;
    let mut original_target_frameworks = None;
    let mut frameworks = Vec::new();

    for snapshot in configurations {
        let restore = snapshot.rule(rules::NUGET_RESTORE);

        if base_intermediate_path.is_none() {
            base_intermediate_path = restore
                .non_empty_property(properties::PROJECT_EXTENSIONS_PATH)
                .map(str::to_string);
        }
        if original_target_frameworks.is_none() {
            original_target_frameworks = restore
                .non_empty_property(properties::TARGET_FRAMEWORKS)
                .map(str::to_string);
        }

        let moniker = target_moniker(restore);
        if frameworks
            .iter()
            .any(|f: &TargetFrameworkInfo| f.target_framework_moniker == moniker)
        {
            tracing::debug!("dropping duplicate target framework '{moniker}' for {project_path}");
            continue;
        }
        frameworks.push(framework_info(moniker, snapshot, project_dir));
    }

    RestoreInfoTree {
        project_path: project_path.to_string(),
        base_intermediate_path: base_intermediate_path.unwrap_or_default(),
        original_target_frameworks: original_target_frameworks.unwrap_or_default(),
        target_frameworks: frameworks.into_iter().collect(),
    }
}

/// Restore-facing moniker, falling back to the general one.
fn target_moniker(restore: &RuleSnapshot) -> String {
    restore
        .non_empty_property(properties::NUGET_TARGET_MONIKER)
        .or_else(|| restore.non_empty_property(properties::TARGET_FRAMEWORK_MONIKER))
        .unwrap_or_default()
        .to_string()
}

fn framework_info(moniker: String, snapshot: &ProjectSnapshot, project_dir: &str) -> TargetFrameworkInfo {
    TargetFrameworkInfo {
        target_framework_moniker: moniker,
        properties: properties_from(&snapshot.rule(rules::NUGET_RESTORE).properties),
        framework_references: reference_items(snapshot.rule(rules::FRAMEWORK_REFERENCE)),
        package_downloads: reference_items(snapshot.rule(rules::PACKAGE_DOWNLOAD)),
        project_references: project_references(snapshot.rule(rules::PROJECT_REFERENCE), project_dir),
        package_references: reference_items(snapshot.rule(rules::PACKAGE_REFERENCE)),
        tool_references: reference_items(snapshot.rule(rules::TOOL_REFERENCE)),
        central_package_versions: reference_items(snapshot.rule(rules::PACKAGE_VERSION)),
    }
}

fn reference_items(rule: &RuleSnapshot) -> KeyedCollection<ReferenceItem> {
    rule.items
        .iter()
        .map(|item| ReferenceItem::new(item.name.clone(), properties_from(&item.metadata)))
        .collect()
}

/// Project references carry a synthesized `ProjectFileFullPath`: the item
/// name resolved against its defining directory (or the project directory).
fn project_references(rule: &RuleSnapshot, project_dir: &str) -> KeyedCollection<ReferenceItem> {
    rule.items
        .iter()
        .map(|item| {
            let base = item
                .metadata(properties::DEFINING_PROJECT_DIRECTORY)
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(project_dir);
            let mut metadata: BTreeMap<String, String> = item.metadata.clone();
            metadata.insert(
                properties::PROJECT_FILE_FULL_PATH.to_string(),
                paths::resolve(base, &item.name),
            );
            ReferenceItem::new(item.name.clone(), properties_from(&metadata))
        })
        .collect()
}
