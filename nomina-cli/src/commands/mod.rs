pub mod build;
pub mod config;
pub mod diff;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};

use nomina_core::{PipelineConfig, SnapshotDocument};
use nomina_restore::{build as build_tree, RestoreInfoTree};

/// Project path used when `--project` is not given: `<dir>/<dir-name>.csproj`.
pub fn default_project_path(dir: &Path) -> String {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("project");
    dir.join(format!("{name}.csproj")).display().to_string()
}

/// Load every snapshot document in `dir` and build one restore tree.
pub fn build_from_dir(dir: &Path, project: Option<&str>) -> Result<RestoreInfoTree> {
    let docs = SnapshotDocument::load_dir(dir)
        .with_context(|| format!("failed to load snapshots from {}", dir.display()))?;
    let project = project
        .map(str::to_string)
        .unwrap_or_else(|| default_project_path(dir));
    Ok(build_tree(&project, docs.iter().map(|(_, doc)| &doc.rules)))
}

/// `--config <file>` if given, else `~/.nomina/config.yaml`.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load_at(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => PipelineConfig::load().context("failed to load ~/.nomina/config.yaml"),
    }
}
