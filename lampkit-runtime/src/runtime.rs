//! The provisioning run.
//!
//! [`run`] drives the phases in order: load the manifest, set every repository
//! up in parallel, then publish serially behind the join, reload the web server
//! once and finally hand the process list to the supervisor. [`start_blocking`]
//! wraps it in a fresh tokio runtime for the CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use lampkit_core::{manifest, ProvisionConfig, RepositoryDescriptor, RepositorySetupResult};
use lampkit_setup::{CommandRunner, Coordinator, SetupContext};

use crate::error::RuntimeError;
use crate::publish::{PublishRecord, Publisher, ReloadOutcome};
use crate::supervisor::{self, SupervisorOutcome};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_supervisor: bool,
}

/// Everything a full run did, phase by phase.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub manifest: PathBuf,
    pub setup: Vec<RepositorySetupResult>,
    pub publish: Vec<PublishRecord>,
    pub reload: ReloadOutcome,
    pub supervisor: SupervisorOutcome,
    pub duration_ms: u128,
}

impl RunSummary {
    fn empty(manifest: PathBuf, reason: &str) -> Self {
        Self {
            manifest,
            setup: Vec::new(),
            publish: Vec::new(),
            reload: ReloadOutcome::Skipped(reason.to_string()),
            supervisor: SupervisorOutcome::Skipped {
                reason: reason.to_string(),
            },
            duration_ms: 0,
        }
    }

    /// Repositories that were set up and published.
    ///
    /// Both phases report in manifest order, so entries pair up by position.
    pub fn configured(&self) -> usize {
        self.setup
            .iter()
            .zip(&self.publish)
            .filter(|(setup, publish)| setup.is_success() && publish.is_published())
            .count()
    }

    /// Any repository failed setup or publish, or the reload failed.
    pub fn has_failures(&self) -> bool {
        self.setup.iter().any(|r| !r.is_success())
            || self.publish.iter().any(|p| p.error.is_some())
            || matches!(self.reload, ReloadOutcome::Failed(_))
    }
}

/// Build a runtime and drive [`run`] to completion on the current thread.
pub fn start_blocking(
    config: &ProvisionConfig,
    runner: Arc<dyn CommandRunner>,
    options: RunOptions,
) -> Result<RunSummary, RuntimeError> {
    build_runtime()?.block_on(run(config, runner, options))
}

/// Multi-threaded runtime for the setup phase.
pub fn build_runtime() -> Result<tokio::runtime::Runtime, RuntimeError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| RuntimeError::Io {
            path: PathBuf::from("tokio-runtime"),
            source,
        })
}

/// Full provisioning run:
/// manifest → parallel setup → join → serial publish → reload → supervisor.
///
/// Only manifest and supervisor failures are returned as errors.
pub async fn run(
    config: &ProvisionConfig,
    runner: Arc<dyn CommandRunner>,
    options: RunOptions,
) -> Result<RunSummary, RuntimeError> {
    let started = Instant::now();
    let descriptors = manifest::load(&config.manifest)?;
    tracing::info!(
        manifest = %config.manifest.display(),
        entries = descriptors.len(),
        "manifest loaded",
    );
    if descriptors.is_empty() {
        tracing::info!("manifest is empty; nothing to do");
        return Ok(RunSummary::empty(config.manifest.clone(), "empty manifest"));
    }

    let setup = setup_phase(config, runner.clone(), descriptors.clone()).await;

    // Join barrier crossed: the serial phase owns the web root from here on.
    let (publish, reload) = {
        let config = config.clone();
        let runner = runner.clone();
        tokio::task::spawn_blocking(move || publish_phase(&config, runner, &descriptors)).await?
    };

    let supervisor = if options.skip_supervisor {
        SupervisorOutcome::Skipped {
            reason: "skipped by request".to_string(),
        }
    } else {
        let supervisor_config = config.supervisor.clone();
        let timeout = config.command_timeout();
        tokio::task::spawn_blocking(move || {
            supervisor::apply_and_persist(runner.as_ref(), &supervisor_config, timeout)
        })
        .await??
    };

    let summary = RunSummary {
        manifest: config.manifest.clone(),
        setup,
        publish,
        reload,
        supervisor,
        duration_ms: started.elapsed().as_millis(),
    };
    tracing::info!(
        configured = summary.configured(),
        total = summary.setup.len(),
        duration_ms = summary.duration_ms as u64,
        "provisioning run complete",
    );
    Ok(summary)
}

/// Parallel setup of every descriptor. Returns after the join barrier.
pub async fn setup_phase(
    config: &ProvisionConfig,
    runner: Arc<dyn CommandRunner>,
    descriptors: Vec<RepositoryDescriptor>,
) -> Vec<RepositorySetupResult> {
    Coordinator::new(SetupContext::from_config(config), runner)
        .run(descriptors)
        .await
}

/// Serial publish of every descriptor, then one web-server reload.
pub fn publish_phase(
    config: &ProvisionConfig,
    runner: Arc<dyn CommandRunner>,
    descriptors: &[RepositoryDescriptor],
) -> (Vec<PublishRecord>, ReloadOutcome) {
    let publisher = Publisher::new(
        config.projects_root.clone(),
        config.web_root.clone(),
        config.permissions.clone(),
        runner,
    )
    .with_timeout(config.command_timeout());
    let records = publisher.publish_all(descriptors);
    let reload = publisher.reload(&config.web_server, &records);
    (records, reload)
}

/// Install the process-wide `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
