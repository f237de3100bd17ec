//! `lampkit supervisor`: supervisor handoff only.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use lampkit_runtime::{apply_and_persist, SupervisorOutcome};
use lampkit_setup::SystemRunner;

use super::GlobalArgs;

/// Arguments for `lampkit supervisor`.
#[derive(Args, Debug)]
pub struct SupervisorArgs {}

impl SupervisorArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let outcome = apply_and_persist(&SystemRunner, &config.supervisor, config.command_timeout())
            .context("supervisor handoff failed")?;
        match outcome {
            SupervisorOutcome::Applied { config_path } => {
                println!("✓ Supervisor applied {}", config_path.display());
            }
            SupervisorOutcome::Skipped { reason } => println!("Supervisor handoff skipped: {reason}"),
        }
        Ok(ExitCode::SUCCESS)
    }
}
