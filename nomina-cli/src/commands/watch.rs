//! `nomina watch <dir> --out <dir>`: long-running project scope.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use nomina_daemon::{watch_blocking, NominationOutcome, ScopeReport, WatchOptions};

use super::{default_project_path, load_config};

/// Arguments for `nomina watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory of `<configuration>.yaml` snapshot documents.
    pub dir: PathBuf,

    /// Directory the `<project>.restore.json` nominations are written to.
    #[arg(long)]
    pub out: PathBuf,

    /// Project file path recorded in the tree.
    #[arg(long)]
    pub project: Option<String>,

    /// Config file to read instead of `~/.nomina/config.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "time")]
    time: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "frameworks")]
    frameworks: usize,
    #[tabled(rename = "items")]
    items: usize,
    #[tabled(rename = "fingerprint")]
    fingerprint: String,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let project = self
            .project
            .unwrap_or_else(|| default_project_path(&self.dir));

        eprintln!(
            "{} {} → {} (Ctrl-C to stop)",
            "watching".cyan().bold(),
            self.dir.display(),
            self.out.display(),
        );
        let report = watch_blocking(WatchOptions {
            dir: self.dir,
            out: self.out,
            project,
            config,
        })
        .context("watch exited with error")?;

        print_report(&report);
        Ok(())
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S%.3f").to_string()
}

fn outcome_label(outcome: &NominationOutcome) -> String {
    match outcome {
        NominationOutcome::Delivered => "delivered".green().to_string(),
        NominationOutcome::Suppressed => "suppressed".dimmed().to_string(),
        NominationOutcome::Cancelled => "cancelled".yellow().to_string(),
        NominationOutcome::Failed(_) => "failed".red().to_string(),
    }
}

fn print_report(report: &ScopeReport) {
    println!("{}", report.project_path.bold());
    if report.history.is_empty() {
        println!("No nominations.");
    } else {
        let rows: Vec<HistoryRow> = report
            .history
            .iter()
            .map(|record| HistoryRow {
                time: local_time(record.at),
                outcome: outcome_label(&record.outcome),
                frameworks: record.frameworks,
                items: record.items,
                fingerprint: record.fingerprint.chars().take(12).collect(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for fault in &report.faults {
        println!(
            "{} [{}] {}: {}",
            "fault".red().bold(),
            local_time(fault.at),
            fault.stage,
            fault.message
        );
    }
}
