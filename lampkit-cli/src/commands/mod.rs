pub mod detect;
pub mod packages;
pub mod preflight;
pub mod provision;
pub mod publish;
pub mod setup;
pub mod summary;
pub mod supervisor;
pub mod validate;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use lampkit_core::{config, ProvisionConfig};
use lampkit_setup::{CommandRunner, SystemRunner};

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Config file (default: ~/.lampkit/config.yaml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Repository manifest (JSON or YAML).
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Root that every `target_dir` is appended to.
    #[arg(long, global = true, value_name = "DIR")]
    pub projects_root: Option<PathBuf>,

    /// Directory the public symlinks are created in.
    #[arg(long, global = true, value_name = "DIR")]
    pub web_root: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    /// Config file (explicit, home, or defaults) with flag overrides applied.
    pub fn load_config(&self) -> Result<ProvisionConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_at(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => config::load_from_home().context("failed to load ~/.lampkit/config.yaml")?,
        };
        if let Some(manifest) = &self.manifest {
            cfg.manifest = manifest.clone();
        }
        if let Some(root) = &self.projects_root {
            cfg.projects_root = root.clone();
        }
        if let Some(root) = &self.web_root {
            cfg.web_root = root.clone();
        }
        Ok(cfg)
    }
}

pub fn system_runner() -> Arc<dyn CommandRunner> {
    Arc::new(SystemRunner)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

/// `FAILURE` when `failed` is set.
pub fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
