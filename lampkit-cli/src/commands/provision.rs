//! `lampkit provision`: the full run.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use lampkit_runtime::{start_blocking, RunOptions, RunSummary};

use super::{exit_code, print_json, summary, system_runner, GlobalArgs};

/// Arguments for `lampkit provision`.
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Exit non-zero if any repository failed (reported after all work ran).
    #[arg(long)]
    pub strict: bool,

    /// Emit the run summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Do not hand off to the process supervisor.
    #[arg(long)]
    pub skip_supervisor: bool,
}

#[derive(Serialize)]
struct ProvisionJson<'a> {
    finished_at: DateTime<Utc>,
    configured: usize,
    failed: bool,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

impl ProvisionArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let options = RunOptions {
            skip_supervisor: self.skip_supervisor,
        };
        let run = start_blocking(&config, system_runner(), options)
            .context("provisioning run failed")?;

        if self.json {
            print_json(&ProvisionJson {
                finished_at: Utc::now(),
                configured: run.configured(),
                failed: run.has_failures(),
                summary: &run,
            })?;
        } else {
            summary::print_run(&run);
        }

        Ok(exit_code(self.strict && run.has_failures()))
    }
}
