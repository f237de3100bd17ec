//! Error types for lampkit-core.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors from loading the repository manifest.
///
/// Any of these aborts the run before a single repository is touched.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file did not exist at the expected path.
    #[error("manifest not found at {path}")]
    NotFound { path: PathBuf },

    /// Underlying I/O failure while reading the manifest.
    #[error("I/O error reading manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error: includes line/column context from serde_json.
    #[error("failed to parse manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse error: includes line context from serde_yaml.
    #[error("failed to parse manifest {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Content parsed, but the document root is not a list.
    #[error("manifest {path} must be a list of repositories, found {found}")]
    NotAList { path: PathBuf, found: &'static str },
}

/// Fatal errors from loading the provisioning configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.lampkit/`.
    #[error("cannot determine home directory; set $HOME or pass --config")]
    HomeNotFound,
}

/// Why a manifest entry was rejected at the unit-of-work boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("repo `{0}` must be a single path component")]
    RepoNotAComponent(String),

    #[error("target_dir `{0}` must not contain `..`")]
    TargetDirEscapes(String),
}
