//! Ecosystem detection for `lampkit-detector`.
//!
//! `detect(path)` inspects marker files in a repository checkout and returns a
//! [`RepoProfile`]: whether the PHP lane applies, which single Node package
//! manager to use, and whether a frontend framework build is expected.
//!
//! Node tool selection is a fixed precedence over lockfile presence and lives
//! in [`NodeTool::from_markers`] so it can be tested without touching disk.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Marker files
// ---------------------------------------------------------------------------

pub const COMPOSER_JSON: &str = "composer.json";
pub const VENDOR_DIR: &str = "vendor";
pub const PACKAGE_JSON: &str = "package.json";
pub const NODE_MODULES_DIR: &str = "node_modules";
pub const PNPM_LOCK: &str = "pnpm-lock.yaml";
pub const YARN_LOCK: &str = "yarn.lock";
pub const NPM_LOCK: &str = "package-lock.json";
pub const ENV_FILE: &str = ".env";
pub const ENV_EXAMPLE_FILE: &str = ".env.example";

/// Dependencies whose presence means the checkout needs a production build.
const FRAMEWORK_MARKERS: &[(&str, &str)] = &[
    ("next", "Next.js"),
    ("nuxt", "Nuxt"),
    ("@sveltejs/kit", "SvelteKit"),
    ("astro", "Astro"),
    ("gatsby", "Gatsby"),
    ("@angular/core", "Angular"),
    ("react-scripts", "Create React App"),
    ("vite", "Vite"),
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The single Node package manager chosen for a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeTool {
    /// No `package.json`: the Node lane does not apply.
    #[default]
    None,
    Npm,
    Yarn,
    Pnpm,
}

impl NodeTool {
    /// Precedence: pnpm lockfile, then yarn lockfile, then plain `package.json`.
    pub fn from_markers(pnpm_lock: bool, yarn_lock: bool, package_json: bool) -> Self {
        if pnpm_lock {
            NodeTool::Pnpm
        } else if yarn_lock {
            NodeTool::Yarn
        } else if package_json {
            NodeTool::Npm
        } else {
            NodeTool::None
        }
    }

    /// Executable name, or `None` when the lane does not apply.
    pub fn program(self) -> Option<&'static str> {
        match self {
            NodeTool::None => None,
            NodeTool::Npm => Some("npm"),
            NodeTool::Yarn => Some("yarn"),
            NodeTool::Pnpm => Some("pnpm"),
        }
    }
}

impl fmt::Display for NodeTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program().unwrap_or("none"))
    }
}

/// PHP lane facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhpProfile {
    /// Framework named in `composer.json`, for log context only.
    pub framework: Option<String>,
    pub vendor_present: bool,
}

/// Node lane facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeProfile {
    pub tool: NodeTool,
    pub npm_lockfile: bool,
    pub node_modules_present: bool,
    /// Frontend framework found among the declared dependencies.
    pub framework: Option<String>,
    pub has_build_script: bool,
}

impl NodeProfile {
    /// A framework marker is declared and there is a `build` script to run.
    pub fn needs_build(&self) -> bool {
        self.framework.is_some() && self.has_build_script
    }
}

/// Everything the installer needs to know about a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoProfile {
    pub root: PathBuf,
    pub php: Option<PhpProfile>,
    pub node: Option<NodeProfile>,
    pub env_example: bool,
    pub env_present: bool,
}

impl RepoProfile {
    /// `.env.example` exists and `.env` does not.
    pub fn needs_env_bootstrap(&self) -> bool {
        self.env_example && !self.env_present
    }

    /// Short human label, e.g. `"php(Laravel) + node:yarn(Vite)"`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(php) = &self.php {
            match &php.framework {
                Some(fw) => parts.push(format!("php({fw})")),
                None => parts.push("php".to_string()),
            }
        }
        if let Some(node) = &self.node {
            match &node.framework {
                Some(fw) => parts.push(format!("node:{}({fw})", node.tool)),
                None => parts.push(format!("node:{}", node.tool)),
            }
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" + ")
        }
    }
}

/// Errors from ecosystem detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Detect the dependency ecosystems of the checkout at `path`.
pub fn detect(path: &Path) -> Result<RepoProfile, DetectError> {
    if !path.is_dir() {
        return Err(DetectError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(RepoProfile {
        root: path.to_path_buf(),
        php: detect_php(path)?,
        node: detect_node(path)?,
        env_example: path.join(ENV_EXAMPLE_FILE).is_file(),
        env_present: path.join(ENV_FILE).exists(),
    })
}

// ---------------------------------------------------------------------------
// Lane detectors
// ---------------------------------------------------------------------------

fn detect_php(path: &Path) -> Result<Option<PhpProfile>, DetectError> {
    let file = path.join(COMPOSER_JSON);
    if !file.exists() { return Ok(None); }
    let content = fs::read_to_string(&file)?;
    let lower = content.to_lowercase();

    let framework = if lower.contains("laravel/framework") {
        Some("Laravel")
    } else if lower.contains("symfony/symfony") || lower.contains("symfony/framework-bundle") {
        Some("Symfony")
    } else if lower.contains("roots/sage") || lower.contains("johnpbloch/wordpress") {
        Some("WordPress")
    } else if lower.contains("slim/slim") {
        Some("Slim")
    } else if lower.contains("cakephp/cakephp") {
        Some("CakePHP")
    } else if lower.contains("codeigniter4/framework") {
        Some("CodeIgniter")
    } else {
        None
    };

    Ok(Some(PhpProfile {
        framework: framework.map(str::to_string),
        vendor_present: path.join(VENDOR_DIR).is_dir(),
    }))
}

fn detect_node(path: &Path) -> Result<Option<NodeProfile>, DetectError> {
    let file = path.join(PACKAGE_JSON);
    let tool = NodeTool::from_markers(
        path.join(PNPM_LOCK).exists(),
        path.join(YARN_LOCK).exists(),
        file.exists(),
    );
    if tool == NodeTool::None {
        return Ok(None);
    }

    // A lockfile without a manifest still selects the tool; the framework
    // checks just come up empty.
    let (framework, has_build_script) = if file.exists() {
        let content = fs::read_to_string(&file)?;
        let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            DetectError::ParseError { path: file.clone(), message: e.to_string() }
        })?;
        let deps = collect_package_json_deps(&json);
        let framework = FRAMEWORK_MARKERS
            .iter()
            .find(|(marker, _)| deps.contains(*marker))
            .map(|(_, name)| name.to_string());
        let has_build = json
            .get("scripts")
            .and_then(|s| s.get("build"))
            .and_then(|b| b.as_str())
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false);
        (framework, has_build)
    } else {
        (None, false)
    };

    Ok(Some(NodeProfile {
        tool,
        npm_lockfile: path.join(NPM_LOCK).exists(),
        node_modules_present: path.join(NODE_MODULES_DIR).is_dir(),
        framework,
        has_build_script,
    }))
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn collect_package_json_deps(json: &serde_json::Value) -> HashSet<String> {
    let mut deps = HashSet::new();
    for key in &["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(obj) = json.get(key).and_then(|v| v.as_object()) {
            for k in obj.keys() {
                deps.insert(k.clone());
            }
        }
    }
    deps
}
