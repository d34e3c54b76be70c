//! Nomina: restore-info projection and nomination from configuration snapshots.
//!
//! # Usage
//!
//! ```text
//! nomina build <dir> [--project <path>] [--json]
//! nomina diff <before-dir> <after-dir> [--project <path>]
//! nomina watch <dir> --out <dir> [--project <path>] [--config <file>]
//! nomina config [--path <file>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{build::BuildArgs, config::ConfigArgs, diff::DiffArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "nomina",
    version,
    about = "Join per-configuration project snapshots and nominate package restore",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the restore tree from a directory of snapshot documents.
    Build(BuildArgs),

    /// Show a unified diff between the restore trees of two snapshot directories.
    Diff(DiffArgs),

    /// Watch a snapshot directory and write a nomination whenever configurations agree.
    Watch(WatchArgs),

    /// Print the effective pipeline configuration.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
