//! `lampkit publish`: serial publish plus one reload.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use lampkit_core::manifest;
use lampkit_runtime::publish_phase;

use super::{exit_code, print_json, summary, system_runner, GlobalArgs};

/// Arguments for `lampkit publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Exit non-zero if any repository failed to publish.
    #[arg(long)]
    pub strict: bool,

    /// Emit the results as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PublishArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let config = global.load_config()?;
        let descriptors = manifest::load(&config.manifest).with_context(|| {
            format!("failed to load manifest '{}'", config.manifest.display())
        })?;

        let (records, reload) = publish_phase(&config, system_runner(), &descriptors);

        if self.json {
            print_json(&json!({ "publish": records, "reload": reload }))?;
        } else if records.is_empty() {
            println!("Manifest is empty; nothing to publish.");
        } else {
            summary::print_publish(&records, &reload);
        }
        Ok(exit_code(self.strict && records.iter().any(|r| r.error.is_some())))
    }
}
