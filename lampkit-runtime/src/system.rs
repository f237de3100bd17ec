//! Host capabilities: package installation and tool preflight.

use std::time::Duration;

use serde::Serialize;

use lampkit_core::config::PackageSet;
use lampkit_setup::{CommandError, CommandRunner, CommandSpec};

use crate::error::PackageError;

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    AlreadyInstalled,
    Installed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageRecord {
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PackageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Query the package manager, install `package` only if the query fails.
pub fn ensure_package_installed(
    runner: &dyn CommandRunner,
    set: &PackageSet,
    package: &str,
    timeout: Option<Duration>,
) -> Result<PackageStatus, PackageError> {
    let query = CommandSpec::from_argv(&set.query)
        .ok_or(PackageError::NotConfigured("query"))?
        .arg(package)
        .timeout(timeout);
    match runner.run(&query) {
        Ok(_) => return Ok(PackageStatus::AlreadyInstalled),
        Err(CommandError::Failed { .. }) => {}
        Err(source) => {
            return Err(PackageError::Query {
                package: package.to_string(),
                source,
            })
        }
    }

    let install = CommandSpec::from_argv(&set.install)
        .ok_or(PackageError::NotConfigured("install"))?
        .arg(package)
        .env("DEBIAN_FRONTEND", "noninteractive")
        .timeout(timeout);
    tracing::info!(package, command = %install.display(), "installing package");
    runner
        .run(&install)
        .map(|_| PackageStatus::Installed)
        .map_err(|source| PackageError::Install {
            package: package.to_string(),
            source,
        })
}

/// Ensure every package in the resolved set, continuing past failures.
pub fn ensure_packages(
    runner: &dyn CommandRunner,
    set: &PackageSet,
    timeout: Option<Duration>,
) -> Vec<PackageRecord> {
    set.resolved()
        .into_iter()
        .map(|package| match ensure_package_installed(runner, set, &package, timeout) {
            Ok(status) => PackageRecord {
                package,
                status: Some(status),
                error: None,
            },
            Err(err) => {
                tracing::error!(package = %package, error = %err, "package not ensured");
                PackageRecord {
                    package,
                    status: None,
                    error: Some(err.to_string()),
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Preflight
// ---------------------------------------------------------------------------

/// Host tools the run may launch, with what they are needed for.
pub const HOST_TOOLS: &[(&str, &str)] = &[
    ("git", "clone repositories"),
    ("composer", "install PHP dependencies"),
    ("npm", "install Node dependencies"),
    ("yarn", "install Node dependencies (yarn.lock)"),
    ("pnpm", "install Node dependencies (pnpm-lock.yaml)"),
    ("setfacl", "default ACLs on published trees"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCheck {
    pub tool: String,
    pub purpose: String,
    pub found: bool,
}

/// Check every host tool plus the configured supervisor program.
pub fn check_host_tools(runner: &dyn CommandRunner, supervisor: &str) -> Vec<ToolCheck> {
    let mut checks: Vec<ToolCheck> = HOST_TOOLS
        .iter()
        .map(|(tool, purpose)| check_tool(runner, tool, purpose))
        .collect();
    checks.push(check_tool(runner, supervisor, "process supervisor handoff"));
    checks
}

fn check_tool(runner: &dyn CommandRunner, tool: &str, purpose: &str) -> ToolCheck {
    ToolCheck {
        tool: tool.to_string(),
        purpose: purpose.to_string(),
        found: runner.is_available(tool),
    }
}
