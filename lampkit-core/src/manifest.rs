//! Repository manifest loading.
//!
//! The manifest is a list of `{org, repo, target_dir}` objects. Load-time
//! validation covers structure only: a missing file, malformed content, or a
//! non-list root is a [`ManifestError`]. Individual entries are never rejected
//! here; a broken entry becomes a descriptor with empty fields and is failed
//! by its own unit of work.
//!
//! Format is chosen by extension: `.yaml` / `.yml` parse as YAML, everything
//! else as JSON.

use std::path::Path;

use serde_json::Value;

use crate::error::ManifestError;
use crate::types::RepositoryDescriptor;

/// Load and structurally validate the manifest at `path`.
///
/// An empty list is a successful, empty result.
pub fn load(path: &Path) -> Result<Vec<RepositoryDescriptor>, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let root = if is_yaml(path) {
        parse_yaml(path, &contents)?
    } else {
        serde_json::from_str::<Value>(&contents).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };

    let Value::Array(entries) = root else {
        return Err(ManifestError::NotAList {
            path: path.to_path_buf(),
            found: kind_of(&root),
        });
    };

    Ok(entries
        .iter()
        .enumerate()
        .map(|(index, entry)| descriptor_from_value(index, entry))
        .collect())
}

/// Build a descriptor from one manifest entry without rejecting anything.
fn descriptor_from_value(index: usize, entry: &Value) -> RepositoryDescriptor {
    let field = |name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    RepositoryDescriptor {
        index,
        org: field("org"),
        repo: field("repo"),
        target_dir: field("target_dir"),
    }
}

fn parse_yaml(path: &Path, contents: &str) -> Result<Value, ManifestError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|source| ManifestError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    // An empty YAML document is `null`, which is not a list.
    serde_json::to_value(yaml).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
