//! `nomina build <dir>`: one-shot restore tree from a snapshot directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use nomina_restore::{fingerprint, to_json, to_yaml};

use super::build_from_dir;

/// Arguments for `nomina build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Directory of `<configuration>.yaml` snapshot documents.
    pub dir: PathBuf,

    /// Project file path recorded in the tree.
    #[arg(long)]
    pub project: Option<String>,

    /// Emit JSON instead of YAML.
    #[arg(long)]
    pub json: bool,
}

impl BuildArgs {
    pub fn run(self) -> Result<()> {
        let tree = build_from_dir(&self.dir, self.project.as_deref())?;

        let rendered = if self.json {
            to_json(&tree).context("failed to render restore tree JSON")?
        } else {
            to_yaml(&tree).context("failed to render restore tree YAML")?
        };
        print!("{rendered}");
        if !rendered.ends_with('\n') {
            println!();
        }

        eprintln!(
            "{} {} framework(s), {} item(s), fingerprint {}",
            "built".green().bold(),
            tree.target_frameworks.len(),
            tree.item_count(),
            &fingerprint(&tree)[..12],
        );
        Ok(())
    }
}
