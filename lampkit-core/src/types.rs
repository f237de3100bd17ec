//! Domain types for a provisioning run.
//!
//! A [`RepositoryDescriptor`] is read once from the manifest and never mutated.
//! The setup phase turns each descriptor into exactly one
//! [`RepositorySetupResult`]; the publish phase turns each into one
//! [`PublishOutcome`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// One manifest entry.
///
/// Fields that were absent (or not strings) in the manifest are empty here;
/// [`RepositoryDescriptor::validate`] is what rejects them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Zero-based position in the manifest.
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub target_dir: String,
}

impl RepositoryDescriptor {
    pub fn new(
        org: impl Into<String>,
        repo: impl Into<String>,
        target_dir: impl Into<String>,
    ) -> Self {
        Self {
            index: 0,
            org: org.into(),
            repo: repo.into(),
            target_dir: target_dir.into(),
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Check the three required fields and reject anything that would let a
    /// unit of work write outside its own `<target_dir>/<repo>` footprint.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.org.trim().is_empty() {
            return Err(DescriptorError::MissingField("org"));
        }
        if self.repo.trim().is_empty() {
            return Err(DescriptorError::MissingField("repo"));
        }
        if self.target_dir.trim().is_empty() {
            return Err(DescriptorError::MissingField("target_dir"));
        }

        let mut components = Path::new(&self.repo).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || self.repo.contains('/') {
            return Err(DescriptorError::RepoNotAComponent(self.repo.clone()));
        }

        if Path::new(&self.target_dir)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(DescriptorError::TargetDirEscapes(self.target_dir.clone()));
        }

        Ok(())
    }

    /// `org/repo` for log lines; falls back to the manifest position when
    /// either part is missing.
    pub fn label(&self) -> String {
        match (self.org.is_empty(), self.repo.is_empty()) {
            (false, false) => format!("{}/{}", self.org, self.repo),
            (true, false) => self.repo.clone(),
            _ => format!("entry #{}", self.index),
        }
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ---------------------------------------------------------------------------
// Setup results
// ---------------------------------------------------------------------------

/// Why a unit of work ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidDescriptor,
    CloneFailed,
    DependencyInstallFailed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidDescriptor => write!(f, "invalid_descriptor"),
            FailureReason::CloneFailed => write!(f, "clone_failed"),
            FailureReason::DependencyInstallFailed => write!(f, "dependency_install_failed"),
        }
    }
}

/// Terminal state of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SetupStatus {
    Succeeded,
    Failed(FailureReason),
}

impl fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStatus::Succeeded => write!(f, "succeeded"),
            SetupStatus::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

/// Per-entry outcome produced by the setup coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySetupResult {
    pub descriptor: RepositoryDescriptor,
    #[serde(flatten)]
    pub status: SetupStatus,
    /// Stage and cause for failures, or a short note of what ran. Never
    /// contains a credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// `None` when the descriptor was too broken to derive a path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_path: Option<PathBuf>,
    pub elapsed_ms: u128,
}

impl RepositorySetupResult {
    pub fn succeeded(descriptor: RepositoryDescriptor, clone_path: PathBuf) -> Self {
        Self {
            descriptor,
            status: SetupStatus::Succeeded,
            detail: None,
            clone_path: Some(clone_path),
            elapsed_ms: 0,
        }
    }

    pub fn failed(
        descriptor: RepositoryDescriptor,
        reason: FailureReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            status: SetupStatus::Failed(reason),
            detail: Some(detail.into()),
            clone_path: None,
            elapsed_ms: 0,
        }
    }

    pub fn with_clone_path(mut self, clone_path: PathBuf) -> Self {
        self.clone_path = Some(clone_path);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == SetupStatus::Succeeded
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.status {
            SetupStatus::Succeeded => None,
            SetupStatus::Failed(reason) => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Publish outcomes
// ---------------------------------------------------------------------------

/// Why the publisher skipped a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidDescriptor,
    CloneMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidDescriptor => write!(f, "invalid descriptor"),
            SkipReason::CloneMissing => write!(f, "clone directory missing"),
        }
    }
}

/// Result of publishing one repository into the web root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published {
        symlink_path: PathBuf,
        permission_policy_applied: bool,
        acl_applied: bool,
    },
    Skipped {
        #[serde(skip_serializing_if = "Option::is_none")]
        symlink_path: Option<PathBuf>,
        reason: SkipReason,
    },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }

    pub fn symlink_path(&self) -> Option<&Path> {
        match self {
            PublishOutcome::Published { symlink_path, .. } => Some(symlink_path),
            PublishOutcome::Skipped { symlink_path, .. } => symlink_path.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_descriptor_passes() {
        let d = RepositoryDescriptor::new("acme", "api", "/projects");
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn missing_fields_are_reported_in_order() {
        let d = RepositoryDescriptor::new("", "api", "/projects");
        assert_eq!(d.validate(), Err(DescriptorError::MissingField("org")));
        let d = RepositoryDescriptor::new("acme", "  ", "/projects");
        assert_eq!(d.validate(), Err(DescriptorError::MissingField("repo")));
        let d = RepositoryDescriptor::new("acme", "bad", "");
        assert_eq!(d.validate(), Err(DescriptorError::MissingField("target_dir")));
    }

    #[test]
    fn repo_must_be_single_component() {
        for repo in ["..", ".", "a/b", "/abs"] {
            let d = RepositoryDescriptor::new("acme", repo, "/projects");
            assert!(
                matches!(d.validate(), Err(DescriptorError::RepoNotAComponent(_))),
                "repo {repo:?} should be rejected"
            );
        }
    }

    #[test]
    fn target_dir_cannot_escape() {
        let d = RepositoryDescriptor::new("acme", "api", "/projects/../etc");
        assert!(matches!(
            d.validate(),
            Err(DescriptorError::TargetDirEscapes(_))
        ));
    }

    #[test]
    fn label_falls_back_to_index() {
        assert_eq!(RepositoryDescriptor::new("acme", "api", "/p").label(), "acme/api");
        let d = RepositoryDescriptor::new("", "", "").with_index(3);
        assert_eq!(d.label(), "entry #3");
    }

    #[test]
    fn status_display() {
        assert_eq!(SetupStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(
            SetupStatus::Failed(FailureReason::InvalidDescriptor).to_string(),
            "failed(invalid_descriptor)"
        );
    }

    #[test]
    fn setup_result_serializes_flat_status() {
        let r = RepositorySetupResult::failed(
            RepositoryDescriptor::new("acme", "bad", ""),
            FailureReason::InvalidDescriptor,
            "missing required field `target_dir`",
        );
        let json = serde_json::to_value(&r).expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "invalid_descriptor");
        assert!(json.get("clone_path").is_none());
    }
}
