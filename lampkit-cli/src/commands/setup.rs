//! `lampkit setup`: clone and install only.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use lampkit_core::manifest;
use lampkit_runtime::{build_runtime, setup_phase};

use super::{exit_code, print_json, summary, system_runner, GlobalArgs};

/// Arguments for `lampkit setup`.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Exit non-zero if any repository failed.
    #[arg(long)]
    pub strict: bool,

    /// Emit the results as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SetupArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let descriptors = manifest::load(&config.manifest).with_context(|| {
            format!("failed to load manifest '{}'", config.manifest.display())
        })?;

        let results = build_runtime()?.block_on(setup_phase(&config, system_runner(), descriptors));

        if self.json {
            print_json(&results)?;
        } else {
            summary::print_setup(&results);
        }
        Ok(exit_code(self.strict && results.iter().any(|r| !r.is_success())))
    }
}
