//! `nomina config`: print the effective pipeline configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::load_config;

/// Arguments for `nomina config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config file to read instead of `~/.nomina/config.yaml`.
    #[arg(long)]
    pub path: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.path.as_deref())?;
        let yaml = serde_yaml::to_string(&config).context("failed to render config YAML")?;
        print!("{yaml}");
        Ok(())
    }
}
