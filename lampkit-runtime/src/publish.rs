//! Filesystem publisher.
//!
//! Runs strictly after the setup join barrier, one repository at a time. It is
//! the only code that touches the shared web root and the provisioning group.
//!
//! Per repository whose clone directory exists:
//!
//! 1. remove an existing symlink at `<web_root>/<repo>`
//! 2. symlink `<web_root>/<repo>` → clone path
//! 3. chgrp the clone tree to the provisioning group
//! 4. normalise modes (see [`crate::permissions`])
//! 5. default ACLs via `setfacl`, when available
//!
//! After the loop the web server is reloaded once.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use lampkit_core::config::WebServerConfig;
use lampkit_core::{layout, PermissionPolicy, PublishOutcome, RepositoryDescriptor, SkipReason};
use lampkit_setup::{CommandRunner, CommandSpec};

use crate::error::{publish_io, PublishError};
use crate::permissions::{normalise_tree, resolve_group};

pub const ACL_TOOL: &str = "setfacl";

/// One line of the publish summary.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRecord {
    pub org: String,
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PublishOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishRecord {
    pub fn is_published(&self) -> bool {
        self.outcome.as_ref().is_some_and(PublishOutcome::is_published)
    }
}

/// What happened to the single web-server reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ReloadOutcome {
    Reloaded,
    Skipped(String),
    Failed(String),
}

/// Publishes clone trees into the web root.
#[derive(Clone)]
pub struct Publisher {
    pub projects_root: PathBuf,
    pub web_root: PathBuf,
    pub policy: PermissionPolicy,
    pub timeout: Option<Duration>,
    runner: Arc<dyn CommandRunner>,
}

impl Publisher {
    pub fn new(
        projects_root: impl Into<PathBuf>,
        web_root: impl Into<PathBuf>,
        policy: PermissionPolicy,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            projects_root: projects_root.into(),
            web_root: web_root.into(),
            policy,
            timeout: None,
            runner,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish one repository.
    pub fn publish(&self, descriptor: &RepositoryDescriptor) -> Result<PublishOutcome, PublishError> {
        if descriptor.validate().is_err() {
            return Ok(PublishOutcome::Skipped {
                symlink_path: None,
                reason: SkipReason::InvalidDescriptor,
            });
        }

        let clone_path = layout::descriptor_clone_path(&self.projects_root, descriptor);
        let public_path = layout::public_path(&self.web_root, &descriptor.repo);
        if !clone_path.is_dir() {
            return Ok(PublishOutcome::Skipped {
                symlink_path: Some(public_path),
                reason: SkipReason::CloneMissing,
            });
        }

        // 1. + 2.
        replace_symlink(&public_path, &clone_path)?;

        // 3. + 4.
        let gid = self.policy.group.as_deref().map(resolve_group).transpose()?;
        let stats = normalise_tree(&clone_path, &self.policy, gid)?;
        tracing::debug!(
            repo = %descriptor.repo,
            dirs = stats.dirs,
            files = stats.files,
            executables = stats.executables,
            "permissions normalised",
        );

        // 5.
        let acl_applied = self.apply_acl(&clone_path)?;

        Ok(PublishOutcome::Published {
            symlink_path: public_path,
            permission_policy_applied: true,
            acl_applied,
        })
    }

    /// Publish every descriptor in order. Failures are logged and recorded;
    /// the loop always reaches the end.
    pub fn publish_all(&self, descriptors: &[RepositoryDescriptor]) -> Vec<PublishRecord> {
        let mut records = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let record = match self.publish(descriptor) {
                Ok(outcome) => {
                    log_outcome(descriptor, &outcome);
                    PublishRecord {
                        org: descriptor.org.clone(),
                        repo: descriptor.repo.clone(),
                        outcome: Some(outcome),
                        error: None,
                    }
                }
                Err(err) => {
                    tracing::error!(
                        org = %descriptor.org,
                        repo = %descriptor.repo,
                        stage = "publish",
                        error = %err,
                        "publish failed",
                    );
                    PublishRecord {
                        org: descriptor.org.clone(),
                        repo: descriptor.repo.clone(),
                        outcome: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            records.push(record);
        }
        records
    }

    /// Reload the web server once, if anything was published.
    pub fn reload(&self, web_server: &WebServerConfig, records: &[PublishRecord]) -> ReloadOutcome {
        if !records.iter().any(PublishRecord::is_published) {
            return ReloadOutcome::Skipped("nothing published".to_string());
        }
        let Some(spec) = CommandSpec::from_argv(&web_server.reload) else {
            return ReloadOutcome::Skipped("no reload command configured".to_string());
        };
        let spec = spec.timeout(self.timeout);
        tracing::info!(command = %spec.display(), "reloading web server");
        match self.runner.run(&spec) {
            Ok(_) => ReloadOutcome::Reloaded,
            Err(err) => {
                tracing::warn!(error = %err, "web server reload failed");
                ReloadOutcome::Failed(err.to_string())
            }
        }
    }

    fn apply_acl(&self, clone_path: &Path) -> Result<bool, PublishError> {
        let Some(group) = self.policy.group.as_deref() else {
            return Ok(false);
        };
        if !self.policy.acl {
            return Ok(false);
        }
        if !self.runner.is_available(ACL_TOOL) {
            tracing::debug!(path = %clone_path.display(), "setfacl not available; skipping ACLs");
            return Ok(false);
        }
        let spec = acl_command(group, clone_path).timeout(self.timeout);
        self.runner.run(&spec).map_err(PublishError::Acl)?;
        Ok(true)
    }
}

/// `setfacl -R -m g:<group>:rwX,d:g:<group>:rwX,o::---,d:o::--- <path>`
pub fn acl_command(group: &str, path: &Path) -> CommandSpec {
    CommandSpec::new(ACL_TOOL)
        .args(["-R", "-m"])
        .arg(format!("g:{group}:rwX,d:g:{group}:rwX,o::---,d:o::---"))
        .arg(path.display().to_string())
}

/// Steps 1 and 2: swap whatever symlink is at `public_path` for a fresh one.
fn replace_symlink(public_path: &Path, clone_path: &Path) -> Result<(), PublishError> {
    match fs::symlink_metadata(public_path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(public_path).map_err(|e| publish_io(public_path, e))?;
        }
        Ok(_) => {
            return Err(PublishError::PublicPathOccupied {
                path: public_path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(publish_io(public_path, err)),
    }

    if let Some(parent) = public_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| publish_io(parent, e))?;
        }
    }
    std::os::unix::fs::symlink(clone_path, public_path).map_err(|e| publish_io(public_path, e))
}

fn log_outcome(descriptor: &RepositoryDescriptor, outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Published {
            symlink_path,
            acl_applied,
            ..
        } => tracing::info!(
            org = %descriptor.org,
            repo = %descriptor.repo,
            path = %symlink_path.display(),
            acl = acl_applied,
            "published",
        ),
        PublishOutcome::Skipped { reason, .. } => tracing::error!(
            org = %descriptor.org,
            repo = %descriptor.repo,
            stage = "publish",
            reason = ?reason,
            "publish skipped",
        ),
    }
}
