//! Provisioning configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.lampkit/
//!   config.yaml     (optional: every key has a default)
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit file; missing file is an error
//! - `load_from_home_at(home)`: `<home>/.lampkit/config.yaml` if present, else defaults
//! - `load_from_home()`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must use the `_at` forms.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::DEFAULT_WEB_ROOT;

// ---------------------------------------------------------------------------
// File modes
// ---------------------------------------------------------------------------

/// A Unix permission mode (`0o0000..=0o7777`).
///
/// Deserializes from an octal string (`"2770"`, `"0o2770"`) or an integer
/// written the way `chmod` takes it (`2770`). YAML `0o` literals must be
/// quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMode", into = "String")]
pub struct FileMode(u32);

impl FileMode {
    pub const fn new(bits: u32) -> Self {
        Self(bits & 0o7777)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Parse an octal mode string, with or without a `0o` / `0` prefix.
    pub fn parse_octal(text: &str) -> Result<Self, String> {
        let digits = text.trim();
        let digits = digits.strip_prefix("0o").unwrap_or(digits);
        let bits = u32::from_str_radix(digits, 8)
            .map_err(|_| format!("invalid octal file mode '{text}'"))?;
        if bits > 0o7777 {
            return Err(format!("file mode '{text}' exceeds 7777"));
        }
        Ok(Self(bits))
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl From<FileMode> for String {
    fn from(mode: FileMode) -> Self {
        format!("0o{:04o}", mode.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMode {
    Int(u32),
    Text(String),
}

impl TryFrom<RawMode> for FileMode {
    type Error = String;

    fn try_from(raw: RawMode) -> Result<Self, Self::Error> {
        match raw {
            RawMode::Int(n) => FileMode::parse_octal(&n.to_string()),
            RawMode::Text(s) => FileMode::parse_octal(&s),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy and sections
// ---------------------------------------------------------------------------

/// Ownership and permission policy applied by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionPolicy {
    /// Shared provisioning group. `None` skips chgrp and ACLs.
    pub group: Option<String>,
    /// Directories. Keep the set-group-ID bit so new files inherit the group.
    pub dir_mode: FileMode,
    /// Regular files.
    pub file_mode: FileMode,
    /// Files that had any execute bit before normalisation.
    pub exec_mode: FileMode,
    /// Set default ACLs when `setfacl` is available.
    pub acl: bool,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            group: Some("www-data".to_string()),
            dir_mode: FileMode::new(0o2770),
            file_mode: FileMode::new(0o660),
            exec_mode: FileMode::new(0o770),
            acl: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebServerConfig {
    /// argv of the reload command.
    pub reload: Vec<String>,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            reload: vec![
                "systemctl".to_string(),
                "reload".to_string(),
                "apache2".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub program: String,
    /// Static process list to hand over. `None` skips the handoff.
    pub source_config: Option<PathBuf>,
    /// Where the process list is copied before it is applied.
    pub install_path: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: "pm2".to_string(),
            source_config: None,
            install_path: PathBuf::from("/etc/lampkit/ecosystem.config.js"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSet {
    pub base: Vec<String>,
    pub redis: bool,
    pub rabbitmq: bool,
    /// argv prefix used to query whether a package is installed.
    pub query: Vec<String>,
    /// argv prefix used to install a package.
    pub install: Vec<String>,
}

impl Default for PackageSet {
    fn default() -> Self {
        let base = [
            "apache2",
            "mariadb-server",
            "php",
            "php-cli",
            "php-mysql",
            "php-xml",
            "php-mbstring",
            "php-curl",
            "composer",
            "nodejs",
            "npm",
            "git",
            "acl",
        ];
        Self {
            base: base.iter().map(|s| s.to_string()).collect(),
            redis: false,
            rabbitmq: false,
            query: vec!["dpkg".to_string(), "-s".to_string()],
            install: vec![
                "apt-get".to_string(),
                "install".to_string(),
                "-y".to_string(),
            ],
        }
    }
}

impl PackageSet {
    /// Base packages plus the optional services that are switched on.
    pub fn resolved(&self) -> Vec<String> {
        let mut packages = self.base.clone();
        if self.redis {
            packages.push("redis-server".to_string());
        }
        if self.rabbitmq {
            packages.push("rabbitmq-server".to_string());
        }
        packages
    }
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

/// Root of `~/.lampkit/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub manifest: PathBuf,
    pub projects_root: PathBuf,
    pub web_root: PathBuf,
    pub git_host: String,
    /// Environment variable holding the clone token.
    pub token_env: String,
    /// Delay between spawning units of work. 0 disables staggering.
    pub stagger_ms: u64,
    /// Per external command. 0 disables the timeout.
    pub command_timeout_secs: u64,
    pub permissions: PermissionPolicy,
    pub web_server: WebServerConfig,
    pub supervisor: SupervisorConfig,
    pub packages: PackageSet,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("repos.json"),
            projects_root: PathBuf::from("/home/dev"),
            web_root: PathBuf::from(DEFAULT_WEB_ROOT),
            git_host: "github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            stagger_ms: 250,
            command_timeout_secs: 1800,
            permissions: PermissionPolicy::default(),
            web_server: WebServerConfig::default(),
            supervisor: SupervisorConfig::default(),
            packages: PackageSet::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

/// `<home>/.lampkit/config.yaml`: pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".lampkit").join("config.yaml")
}

/// Load the config at `path`. A missing file is an error.
pub fn load_at(path: &Path) -> Result<ProvisionConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(ProvisionConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.lampkit/config.yaml` if it exists, else defaults.
pub fn load_from_home_at(home: &Path) -> Result<ProvisionConfig, ConfigError> {
    let path = default_path_at(home);
    if path.exists() {
        load_at(&path)
    } else {
        Ok(ProvisionConfig::default())
    }
}

/// `load_from_home_at` convenience wrapper.
pub fn load_from_home() -> Result<ProvisionConfig, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_from_home_at(&home)
}
