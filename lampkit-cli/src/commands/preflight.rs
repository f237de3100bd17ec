//! `lampkit preflight`: which host tools are on PATH.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use lampkit_runtime::check_host_tools;
use lampkit_setup::SystemRunner;

use super::{print_json, GlobalArgs};

/// Arguments for `lampkit preflight`.
#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ToolRow {
    #[tabled(rename = "tool")]
    tool: String,
    #[tabled(rename = "found")]
    found: String,
    #[tabled(rename = "needed for")]
    purpose: String,
}

impl PreflightArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let checks = check_host_tools(&SystemRunner, &config.supervisor.program);

        if self.json {
            print_json(&checks)?;
            return Ok(ExitCode::SUCCESS);
        }

        let missing = checks.iter().filter(|c| !c.found).count();
        let rows: Vec<ToolRow> = checks
            .into_iter()
            .map(|c| ToolRow {
                found: if c.found {
                    "■".green().bold().to_string()
                } else {
                    "■".red().bold().to_string()
                },
                tool: c.tool,
                purpose: c.purpose,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        if missing > 0 {
            println!("{missing} tool(s) missing; repositories needing them will fail setup.");
        }
        Ok(ExitCode::SUCCESS)
    }
}
