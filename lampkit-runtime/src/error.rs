use std::path::PathBuf;

use thiserror::Error;

use lampkit_core::{ConfigError, ManifestError};
use lampkit_setup::CommandError;

/// Failure to publish one repository. Logged and skipped, never fatal.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Something other than a symlink already sits at the public path.
    #[error("public path {path} exists and is not a symlink; refusing to replace it")]
    PublicPathOccupied { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provisioning group '{group}' does not exist")]
    GroupNotFound { group: String },

    #[error("failed to look up group '{group}': {source}")]
    GroupLookup {
        group: String,
        #[source]
        source: nix::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("setting default ACLs failed: {0}")]
    Acl(#[source] CommandError),
}

/// Failure of the supervisor handoff. Fatal for the run.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("supervisor config {path} does not exist")]
    MissingSourceConfig { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor step `{step}` failed: {source}")]
    Command {
        step: &'static str,
        #[source]
        source: CommandError,
    },
}

/// Failure to install one host package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("package command is not configured ({0} argv is empty)")]
    NotConfigured(&'static str),

    #[error("could not query package '{package}': {source}")]
    Query {
        package: String,
        #[source]
        source: CommandError,
    },

    #[error("could not install package '{package}': {source}")]
    Install {
        package: String,
        #[source]
        source: CommandError,
    },
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn publish_io(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn supervisor_io(path: impl Into<PathBuf>, source: std::io::Error) -> SupervisorError {
    SupervisorError::Io {
        path: path.into(),
        source,
    }
}
