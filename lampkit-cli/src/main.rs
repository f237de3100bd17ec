//! lampkit: provision a LAMP/Node host from a repository manifest.
//!
//! # Usage
//!
//! ```text
//! lampkit provision [--strict] [--json] [--skip-supervisor]
//! lampkit setup [--json]
//! lampkit publish [--json]
//! lampkit supervisor
//! lampkit packages [--json]
//! lampkit detect <path> [--json]
//! lampkit validate [--json]
//! lampkit preflight [--json]
//! ```
//!
//! Global flags: `--config`, `--manifest`, `--projects-root`, `--web-root`,
//! `--log-json`.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    detect::DetectArgs, packages::PackagesArgs, preflight::PreflightArgs,
    provision::ProvisionArgs, publish::PublishArgs, setup::SetupArgs,
    supervisor::SupervisorArgs, validate::ValidateArgs, GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "lampkit",
    version,
    about = "Clone, install and publish a fleet of PHP/Node repositories",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Full run: setup, publish, reload, supervisor handoff.
    Provision(ProvisionArgs),

    /// Clone and install every manifest entry (unprivileged phase only).
    Setup(SetupArgs),

    /// Publish every cloned repository into the web root and reload once.
    Publish(PublishArgs),

    /// Hand the process list to the supervisor.
    Supervisor(SupervisorArgs),

    /// Ensure the configured host packages are installed.
    Packages(PackagesArgs),

    /// Print the ecosystems detected in a checkout.
    Detect(DetectArgs),

    /// Load the manifest and report per-entry validity.
    Validate(ValidateArgs),

    /// Report which host tools are on PATH.
    Preflight(PreflightArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    lampkit_runtime::init_tracing(cli.global.log_json);
    match cli.command {
        Commands::Provision(args) => args.run(&cli.global),
        Commands::Setup(args) => args.run(&cli.global),
        Commands::Publish(args) => args.run(&cli.global),
        Commands::Supervisor(args) => args.run(&cli.global),
        Commands::Packages(args) => args.run(&cli.global),
        Commands::Detect(args) => args.run(),
        Commands::Validate(args) => args.run(&cli.global),
        Commands::Preflight(args) => args.run(&cli.global),
    }
}
