//! `lampkit validate`: structural and per-entry manifest check.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use lampkit_core::{layout, manifest};

use super::{exit_code, print_json, GlobalArgs};

/// Arguments for `lampkit validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "clone path")]
    clone_path: String,
    #[tabled(rename = "public path")]
    public_path: String,
    #[tabled(rename = "problem")]
    problem: String,
}

impl ValidateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let descriptors = manifest::load(&config.manifest).with_context(|| {
            format!("failed to load manifest '{}'", config.manifest.display())
        })?;

        let rows: Vec<EntryRow> = descriptors
            .iter()
            .map(|d| match d.validate() {
                Ok(()) => EntryRow {
                    index: d.index,
                    repository: d.label(),
                    clone_path: layout::descriptor_clone_path(&config.projects_root, d)
                        .display()
                        .to_string(),
                    public_path: layout::public_path(&config.web_root, &d.repo)
                        .display()
                        .to_string(),
                    problem: String::new(),
                },
                Err(err) => EntryRow {
                    index: d.index,
                    repository: d.label(),
                    clone_path: String::new(),
                    public_path: String::new(),
                    problem: err.to_string(),
                },
            })
            .collect();
        let invalid = rows.iter().filter(|r| !r.problem.is_empty()).count();

        if self.json {
            print_json(&rows)?;
        } else {
            println!(
                "{}: {} entries, {} valid, {} invalid",
                config.manifest.display(),
                rows.len(),
                (rows.len() - invalid).to_string().green(),
                invalid.to_string().red(),
            );
            if !rows.is_empty() {
                let mut table = Table::new(rows);
                table.with(Style::rounded());
                println!("{table}");
            }
        }
        Ok(exit_code(invalid > 0))
    }
}
