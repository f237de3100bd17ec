//! `lampkit packages`: ensure the configured host packages.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use lampkit_runtime::{ensure_packages, system::PackageStatus};
use lampkit_setup::SystemRunner;

use super::{exit_code, print_json, GlobalArgs};

/// Arguments for `lampkit packages`.
#[derive(Args, Debug)]
pub struct PackagesArgs {
    /// Emit the results as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "package")]
    package: String,
    #[tabled(rename = "status")]
    status: String,
}

impl PackagesArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let records = ensure_packages(&SystemRunner, &config.packages, config.command_timeout());
        let failed = records.iter().any(|r| r.error.is_some());

        if self.json {
            print_json(&records)?;
        } else {
            let rows: Vec<PackageRow> = records
                .into_iter()
                .map(|r| PackageRow {
                    package: r.package,
                    status: match (r.status, r.error) {
                        (Some(PackageStatus::AlreadyInstalled), _) => "present".green().to_string(),
                        (Some(PackageStatus::Installed), _) => "installed".green().bold().to_string(),
                        (None, Some(err)) => format!("failed: {err}").red().to_string(),
                        (None, None) => String::new(),
                    },
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        Ok(exit_code(failed))
    }
}
