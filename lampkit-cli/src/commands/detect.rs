//! `lampkit detect <path>`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use super::print_json;

/// Print the ecosystems detected in a checkout.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Checkout to inspect.
    pub path: PathBuf,

    /// Emit the full profile as JSON.
    #[arg(long)]
    pub json: bool,
}

impl DetectArgs {
    pub fn run(self) -> Result<ExitCode> {
        let profile = lampkit_detector::detect(&self.path)
            .with_context(|| format!("detection failed for '{}'", self.path.display()))?;

        if self.json {
            print_json(&profile)?;
            return Ok(ExitCode::SUCCESS);
        }

        println!("{}: {}", self.path.display(), profile.summary());
        if let Some(node) = &profile.node {
            let build = if node.needs_build() { "yes" } else { "no" };
            println!("  node_modules present: {}", node.node_modules_present);
            println!("  framework build:      {build}");
        }
        if let Some(php) = &profile.php {
            println!("  vendor present:       {}", php.vendor_present);
        }
        if profile.needs_env_bootstrap() {
            println!("  .env will be created from .env.example");
        }
        Ok(ExitCode::SUCCESS)
    }
}
