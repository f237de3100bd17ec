//! Parallel setup coordinator.
//!
//! One unit of work per descriptor, each on the blocking pool:
//!
//! ```text
//! validate ──✗──> failed(invalid_descriptor)     (filesystem untouched)
//!    │
//! fetch ─────✗──> failed(clone_failed)
//!    │
//! install ───✗──> failed(dependency_install_failed)
//!    │
//! succeeded
//! ```
//!
//! Units share nothing mutable and write disjoint paths, so there are no locks.
//! `run` is the join barrier: it returns only after every unit is terminal,
//! with results in manifest order. A failing or panicking unit never cancels
//! its siblings.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use lampkit_core::{
    layout, FailureReason, ProvisionConfig, RepositoryDescriptor, RepositorySetupResult,
};

use crate::fetch::{Credential, FetchOutcome, Fetcher};
use crate::install::Installer;
use crate::runner::CommandRunner;

/// Everything a unit of work needs, shared read-only by all units.
#[derive(Debug, Clone)]
pub struct SetupContext {
    pub projects_root: PathBuf,
    pub fetcher: Fetcher,
    pub installer: Installer,
    pub credential: Option<Credential>,
    /// Delay between spawns. Zero spawns everything at once.
    pub stagger: Duration,
}

impl SetupContext {
    /// Build from config, reading the clone token from `config.token_env`.
    pub fn from_config(config: &ProvisionConfig) -> Self {
        let timeout = config.command_timeout();
        Self {
            projects_root: config.projects_root.clone(),
            fetcher: Fetcher::new(config.git_host.clone(), timeout),
            installer: Installer::new(timeout),
            credential: Credential::from_env(&config.token_env),
            stagger: config.stagger(),
        }
    }
}

/// Fans out one unit per descriptor and joins them.
#[derive(Clone)]
pub struct Coordinator {
    ctx: Arc<SetupContext>,
    runner: Arc<dyn CommandRunner>,
}

impl Coordinator {
    pub fn new(ctx: SetupContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            runner,
        }
    }

    pub fn context(&self) -> &SetupContext {
        &self.ctx
    }

    /// Run every unit and wait for all of them.
    ///
    /// Returns exactly one result per descriptor, in input order.
    pub async fn run(&self, descriptors: Vec<RepositoryDescriptor>) -> Vec<RepositorySetupResult> {
        let total = descriptors.len();
        let mut slots: Vec<Option<RepositorySetupResult>> = vec![None; total];
        let mut units = JoinSet::new();

        for (slot, descriptor) in descriptors.iter().cloned().enumerate() {
            if slot > 0 && !self.ctx.stagger.is_zero() {
                tokio::time::sleep(self.ctx.stagger).await;
            }
            let ctx = self.ctx.clone();
            let runner = self.runner.clone();
            units.spawn_blocking(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_unit(&ctx, runner.as_ref(), descriptor.clone())
                }));
                let result = outcome.unwrap_or_else(|_| {
                    tracing::error!(repo = %descriptor, "unit of work panicked");
                    abandoned_result(&ctx, descriptor, "unit of work panicked")
                });
                (slot, result)
            });
        }

        // Join barrier.
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((slot, result)) => slots[slot] = Some(result),
                Err(err) => tracing::error!(error = %err, "unit of work did not complete"),
            }
        }

        let results: Vec<RepositorySetupResult> = slots
            .into_iter()
            .zip(descriptors)
            .map(|(slot, descriptor)| {
                slot.unwrap_or_else(|| {
                    abandoned_result(&self.ctx, descriptor, "unit of work did not complete")
                })
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            total,
            succeeded,
            failed = total - succeeded,
            "setup phase complete",
        );
        results
    }
}

/// One unit of work: validate, fetch, install.
///
/// Never panics on bad input and never returns an error: every failure is
/// folded into the result.
pub fn run_unit(
    ctx: &SetupContext,
    runner: &dyn CommandRunner,
    descriptor: RepositoryDescriptor,
) -> RepositorySetupResult {
    let started = Instant::now();
    let finish = |result: RepositorySetupResult| RepositorySetupResult {
        elapsed_ms: started.elapsed().as_millis(),
        ..result
    };

    if let Err(err) = descriptor.validate() {
        tracing::error!(
            entry = descriptor.index,
            org = %descriptor.org,
            repo = %descriptor.repo,
            error = %err,
            "invalid manifest entry",
        );
        return finish(RepositorySetupResult::failed(
            descriptor,
            FailureReason::InvalidDescriptor,
            err.to_string(),
        ));
    }

    let org = descriptor.org.clone();
    let repo = descriptor.repo.clone();
    let clone_path = layout::descriptor_clone_path(&ctx.projects_root, &descriptor);

    let fetched = ctx.fetcher.ensure_present(
        runner,
        &org,
        &repo,
        &clone_path,
        ctx.credential.as_ref(),
    );
    let fetched = match fetched {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(org = %org, repo = %repo, stage = "clone", error = %err, "fetch failed");
            return finish(
                RepositorySetupResult::failed(descriptor, FailureReason::CloneFailed, err.to_string())
                    .with_clone_path(clone_path),
            );
        }
    };

    let report = match ctx.installer.install(runner, &clone_path) {
        Ok(report) => report,
        Err(err) => {
            let stage = err
                .stage()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "detect".to_string());
            tracing::error!(org = %org, repo = %repo, stage = %stage, error = %err, "install failed");
            return finish(
                RepositorySetupResult::failed(
                    descriptor,
                    FailureReason::DependencyInstallFailed,
                    err.to_string(),
                )
                .with_clone_path(clone_path),
            );
        }
    };

    let fetched_note = match fetched {
        FetchOutcome::AlreadyPresent => "already cloned",
        FetchOutcome::Cloned => "cloned",
    };
    let result = finish(
        RepositorySetupResult::succeeded(descriptor, clone_path)
            .with_detail(format!("{fetched_note}; {}", report.describe())),
    );
    tracing::info!(
        org = %org,
        repo = %repo,
        elapsed_ms = result.elapsed_ms as u64,
        detail = result.detail.as_deref().unwrap_or_default(),
        "repository ready",
    );
    result
}

/// Result for a unit that ended without reporting (panic or lost task).
///
/// The filesystem decides the reason: no clone directory means the clone
/// never finished.
fn abandoned_result(
    ctx: &SetupContext,
    descriptor: RepositoryDescriptor,
    detail: &str,
) -> RepositorySetupResult {
    if descriptor.validate().is_err() {
        return RepositorySetupResult::failed(descriptor, FailureReason::InvalidDescriptor, detail);
    }
    let clone_path = layout::descriptor_clone_path(&ctx.projects_root, &descriptor);
    let reason = if clone_path.is_dir() {
        FailureReason::DependencyInstallFailed
    } else {
        FailureReason::CloneFailed
    };
    RepositorySetupResult::failed(descriptor, reason, detail).with_clone_path(clone_path)
}
