//! Dependency installer.
//!
//! Runs the ordered stages for one checkout:
//!
//! 1. PHP lane: `composer install` when `composer.json` exists and `vendor/` does not.
//! 2. Node lane: one package manager (pnpm > yarn > npm) unless `node_modules/` exists.
//! 3. Build: `<tool> run build` when a framework marker with a `build` script
//!    is declared and no earlier build succeeded. Success is recorded in
//!    [`BUILD_MARKER`], so a failed build is retried on the next run.
//! 4. Env bootstrap: copy `.env.example` to `.env` when `.env` is missing.
//!
//! Every stage either runs, is skipped with a reason, or fails the whole
//! install with an [`InstallError`] naming the stage. Nothing outside the
//! checkout is written.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use lampkit_detector::{self as detector, NodeProfile, NodeTool, ENV_EXAMPLE_FILE, ENV_FILE};

use crate::error::InstallError;
use crate::runner::{CommandRunner, CommandSpec};

/// Written inside the checkout after a successful framework build.
pub const BUILD_MARKER: &str = "node_modules/.lampkit-build";

// ---------------------------------------------------------------------------
// Stages and report
// ---------------------------------------------------------------------------

/// One independently failable install step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "stage", content = "tool", rename_all = "snake_case")]
pub enum InstallStage {
    Php,
    Node(NodeTool),
    Build(NodeTool),
    EnvBootstrap,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStage::Php => write!(f, "php"),
            InstallStage::Node(tool) => write!(f, "node:{tool}"),
            InstallStage::Build(tool) => write!(f, "build:{tool}"),
            InstallStage::EnvBootstrap => write!(f, "env"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Ran,
    Skipped(&'static str),
}

/// What the installer did, stage by stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub stages: Vec<(InstallStage, StageStatus)>,
}

impl InstallReport {
    fn ran(&mut self, stage: InstallStage) {
        self.stages.push((stage, StageStatus::Ran));
    }

    fn skipped(&mut self, stage: InstallStage, why: &'static str) {
        self.stages.push((stage, StageStatus::Skipped(why)));
    }

    /// Stages that actually executed.
    pub fn executed(&self) -> Vec<InstallStage> {
        self.stages
            .iter()
            .filter(|(_, status)| *status == StageStatus::Ran)
            .map(|(stage, _)| *stage)
            .collect()
    }

    /// `true` when no stage ran (a repeat install).
    pub fn is_noop(&self) -> bool {
        self.executed().is_empty()
    }

    /// `"php, node:yarn"` or `"nothing to install"`.
    pub fn describe(&self) -> String {
        let ran = self.executed();
        if ran.is_empty() {
            return "nothing to install".to_string();
        }
        ran.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }
}

// ---------------------------------------------------------------------------
// Installer
// ---------------------------------------------------------------------------

/// Installs dependencies inside one checkout.
#[derive(Debug, Clone, Default)]
pub struct Installer {
    pub timeout: Option<Duration>,
}

impl Installer {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Run every applicable stage in `repo_root`.
    pub fn install(
        &self,
        runner: &dyn CommandRunner,
        repo_root: &Path,
    ) -> Result<InstallReport, InstallError> {
        let profile = detector::detect(repo_root)?;
        tracing::debug!(path = %repo_root.display(), ecosystems = %profile.summary(), "detected");
        let mut report = InstallReport::default();

        // 1. PHP lane
        match &profile.php {
            None => report.skipped(InstallStage::Php, "no composer.json"),
            Some(php) if php.vendor_present => {
                report.skipped(InstallStage::Php, "vendor/ already present")
            }
            Some(_) => {
                let spec = CommandSpec::new("composer")
                    .args([
                        "install",
                        "--no-interaction",
                        "--prefer-dist",
                        "--ignore-platform-reqs",
                    ])
                    .env("COMPOSER_ALLOW_SUPERUSER", "1");
                self.exec(runner, repo_root, InstallStage::Php, spec)?;
                report.ran(InstallStage::Php);
            }
        }

        // 2. Node lane, 3. build
        match &profile.node {
            None => report.skipped(InstallStage::Node(NodeTool::None), "no package.json"),
            Some(node) if node.node_modules_present => {
                report.skipped(InstallStage::Node(node.tool), "node_modules/ already present");
            }
            Some(node) => {
                let stage = InstallStage::Node(node.tool);
                self.exec(runner, repo_root, stage, node_install_command(node))?;
                report.ran(stage);
            }
        }
        if let Some(node) = &profile.node {
            self.build(runner, repo_root, node, &mut report)?;
        }

        // 4. Env bootstrap
        if profile.needs_env_bootstrap() {
            let from = repo_root.join(ENV_EXAMPLE_FILE);
            let to = repo_root.join(ENV_FILE);
            std::fs::copy(&from, &to).map_err(|source| InstallError::Io {
                stage: InstallStage::EnvBootstrap,
                path: to.clone(),
                source,
            })?;
            report.ran(InstallStage::EnvBootstrap);
        } else if profile.env_present {
            report.skipped(InstallStage::EnvBootstrap, ".env already present");
        } else {
            report.skipped(InstallStage::EnvBootstrap, "no .env.example");
        }

        Ok(report)
    }

    fn build(
        &self,
        runner: &dyn CommandRunner,
        repo_root: &Path,
        node: &NodeProfile,
        report: &mut InstallReport,
    ) -> Result<(), InstallError> {
        let stage = InstallStage::Build(node.tool);
        if !node.needs_build() {
            report.skipped(stage, "no framework build");
            return Ok(());
        }
        let marker = repo_root.join(BUILD_MARKER);
        if marker.is_file() {
            report.skipped(stage, "already built");
            return Ok(());
        }

        let tool = node.tool.program().unwrap_or("npm");
        self.exec(runner, repo_root, stage, CommandSpec::new(tool).args(["run", "build"]))?;
        let io_err = |source| InstallError::Io {
            stage,
            path: marker.clone(),
            source,
        };
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&marker, "").map_err(io_err)?;
        report.ran(stage);
        Ok(())
    }

    fn exec(
        &self,
        runner: &dyn CommandRunner,
        repo_root: &Path,
        stage: InstallStage,
        spec: CommandSpec,
    ) -> Result<(), InstallError> {
        let spec = spec.current_dir(repo_root).timeout(self.timeout);
        tracing::info!(stage = %stage, path = %repo_root.display(), command = %spec.display(), "install stage");
        runner
            .run(&spec)
            .map(|_| ())
            .map_err(|source| InstallError::Command { stage, source })
    }
}

/// Frozen, non-interactive install for the selected tool.
pub fn node_install_command(node: &NodeProfile) -> CommandSpec {
    match node.tool {
        NodeTool::Pnpm => CommandSpec::new("pnpm")
            .args(["install", "--frozen-lockfile"])
            .env("CI", "true"),
        NodeTool::Yarn => {
            CommandSpec::new("yarn").args(["install", "--frozen-lockfile", "--non-interactive"])
        }
        NodeTool::Npm | NodeTool::None => {
            let verb = if node.npm_lockfile { "ci" } else { "install" };
            CommandSpec::new("npm").args([verb, "--no-audit", "--no-fund"])
        }
    }
}
