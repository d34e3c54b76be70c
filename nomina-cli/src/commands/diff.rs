//! `nomina diff <before> <after>`: unified diff of two restore trees.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use nomina_restore::diff_trees;

use super::build_from_dir;

/// Arguments for `nomina diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Snapshot directory of the earlier state.
    pub before: PathBuf,

    /// Snapshot directory of the later state.
    pub after: PathBuf,

    /// Project file path recorded in both trees.
    #[arg(long)]
    pub project: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        // Both trees must share a project path or every diff is non-empty.
        let project = self
            .project
            .clone()
            .unwrap_or_else(|| super::default_project_path(&self.after));
        let before = build_from_dir(&self.before, Some(&project))?;
        let after = build_from_dir(&self.after, Some(&project))?;

        let before_label = self.before.display().to_string();
        let after_label = self.after.display().to_string();
        let diff = diff_trees(&before, &after, &before_label, &after_label)
            .context("failed to render restore tree diff")?;

        let Some(diff) = diff else {
            println!("No differences.");
            return Ok(());
        };
        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
