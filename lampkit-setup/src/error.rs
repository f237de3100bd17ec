//! Error types for lampkit-setup.
//!
//! [`CommandError`] is the shared cause of every stage failure. The fetch and
//! install errors add the stage; the coordinator turns both into a
//! `RepositorySetupResult` so nothing here ever ends a run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use lampkit_detector::DetectError;

use crate::install::InstallStage;

const REDACTED: &str = "***";

/// Failure to run one external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started (not installed, not executable).
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program outlived its timeout and was killed.
    #[error("`{command}` timed out after {after:?}")]
    TimedOut { command: String, after: Duration },
}

impl CommandError {
    /// Replace every occurrence of `secret` in the error's text.
    pub fn redact(self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }
        let scrub = |s: String| s.replace(secret, REDACTED);
        match self {
            CommandError::Spawn { program, source } => CommandError::Spawn {
                program: scrub(program),
                source,
            },
            CommandError::Failed {
                command,
                code,
                stderr,
            } => CommandError::Failed {
                command: scrub(command),
                code,
                stderr: scrub(stderr),
            },
            CommandError::TimedOut { command, after } => CommandError::TimedOut {
                command: scrub(command),
                after,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::TimedOut { .. })
    }
}

/// Errors from the repository fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Something that is not a directory sits at the clone path.
    #[error("clone path {path} exists and is not a directory")]
    TargetNotADirectory { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `git clone` failed. The URL in `remote` has its credential masked.
    #[error("clone of {remote} failed: {source}")]
    Clone {
        remote: String,
        #[source]
        source: CommandError,
    },
}

/// Errors from the dependency installer, tagged with the failing stage.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{stage} stage failed: {source}")]
    Command {
        stage: InstallStage,
        #[source]
        source: CommandError,
    },

    #[error("{stage} stage failed: I/O error at {path}: {source}")]
    Io {
        stage: InstallStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkout's manifests could not be read.
    #[error("ecosystem detection failed: {0}")]
    Detect(#[from] DetectError),
}

impl InstallError {
    /// The stage that failed, `None` for detection failures.
    pub fn stage(&self) -> Option<InstallStage> {
        match self {
            InstallError::Command { stage, .. } | InstallError::Io { stage, .. } => Some(*stage),
            InstallError::Detect(_) => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub(crate) fn fetch_io(path: impl Into<PathBuf>, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_masks_command_and_stderr() {
        let err = CommandError::Failed {
            command: "git clone https://tok123@github.com/acme/api.git".to_string(),
            code: Some(128),
            stderr: "fatal: could not read from https://tok123@github.com".to_string(),
        }
        .redact("tok123");
        let msg = err.to_string();
        assert!(!msg.contains("tok123"), "leaked: {msg}");
        assert!(msg.contains("***@github.com"));
        assert!(msg.contains("128"));
    }

    #[test]
    fn redact_with_empty_secret_is_identity() {
        let err = CommandError::TimedOut {
            command: "npm ci".to_string(),
            after: Duration::from_secs(5),
        }
        .redact("");
        assert_eq!(err.to_string(), "`npm ci` timed out after 5s");
    }

    #[test]
    fn sub_second_timeout_keeps_its_unit() {
        let err = CommandError::TimedOut {
            command: "git clone".to_string(),
            after: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "`git clone` timed out after 250ms");
    }
}
