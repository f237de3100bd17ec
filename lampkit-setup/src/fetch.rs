//! Repository fetcher.
//!
//! `ensure_present` is idempotent at directory granularity: an existing
//! directory at the clone path is taken as a finished clone and left alone.
//! Otherwise a full `git clone` runs with the credential embedded in the URL.
//! The credential is registered as a secret on the command, and every error
//! is redacted again before it leaves this module.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{fetch_io, FetchError};
use crate::runner::{CommandRunner, CommandSpec};

/// An access token for the git host. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from `var`; empty or unset yields `None`.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// What `ensure_present` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent,
    Cloned,
}

/// Clones repositories from one git host.
#[derive(Debug, Clone)]
pub struct Fetcher {
    pub host: String,
    pub timeout: Option<Duration>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            timeout: None,
        }
    }
}

impl Fetcher {
    pub fn new(host: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }

    /// `https://[<token>@]<host>/<org>/<repo>.git`
    pub fn clone_url(&self, org: &str, repo: &str, credential: Option<&Credential>) -> String {
        match credential {
            Some(token) => format!("https://{}@{}/{org}/{repo}.git", token.expose(), self.host),
            None => format!("https://{}/{org}/{repo}.git", self.host),
        }
    }

    /// Make sure `org/repo` is checked out at `target_path`.
    pub fn ensure_present(
        &self,
        runner: &dyn CommandRunner,
        org: &str,
        repo: &str,
        target_path: &Path,
        credential: Option<&Credential>,
    ) -> Result<FetchOutcome, FetchError> {
        if target_path.is_dir() {
            tracing::debug!(org, repo, path = %target_path.display(), "clone already present");
            return Ok(FetchOutcome::AlreadyPresent);
        }
        if target_path.exists() {
            return Err(FetchError::TargetNotADirectory {
                path: target_path.to_path_buf(),
            });
        }

        if let Some(parent) = target_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fetch_io(parent, e))?;
        }

        let url = self.clone_url(org, repo, credential);
        let secret = credential.map(Credential::expose).unwrap_or_default();
        let spec = CommandSpec::new("git")
            .arg("clone")
            .arg(&url)
            .arg(target_path.display().to_string())
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.timeout)
            .secret(secret);

        tracing::info!(org, repo, path = %target_path.display(), "cloning");
        if let Err(err) = runner.run(&spec) {
            // A half-written checkout must not look present on the next run.
            if target_path.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(target_path) {
                    tracing::warn!(
                        org,
                        repo,
                        path = %target_path.display(),
                        error = %cleanup,
                        "failed to remove partial clone",
                    );
                }
            }
            return Err(FetchError::Clone {
                remote: spec.redact(&url),
                source: err.redact(secret),
            });
        }

        Ok(FetchOutcome::Cloned)
    }
}
