//! Filesystem layout contract.
//!
//! ```text
//! <projects_root><target_dir>/<repo>   clone path (written by the setup phase)
//! <web_root>/<repo>                    public symlink (written by the publisher)
//! ```
//!
//! Both shapes are load-bearing: vhosts and supervisor configs point at them.

use std::path::{Path, PathBuf};

use crate::types::RepositoryDescriptor;

/// Default public web root.
pub const DEFAULT_WEB_ROOT: &str = "/var/www";

/// `<projects_root><target_dir>/<repo>`: pure, no I/O.
///
/// `target_dir` is a fragment appended to the projects root, so a leading `/`
/// does not make it absolute.
pub fn clone_path(projects_root: &Path, target_dir: &str, repo: &str) -> PathBuf {
    let fragment = target_dir.trim_start_matches('/');
    projects_root.join(fragment).join(repo)
}

/// Clone path for a descriptor.
pub fn descriptor_clone_path(projects_root: &Path, descriptor: &RepositoryDescriptor) -> PathBuf {
    clone_path(projects_root, &descriptor.target_dir, &descriptor.repo)
}

/// `<web_root>/<repo>`: pure, no I/O.
pub fn public_path(web_root: &Path, repo: &str) -> PathBuf {
    web_root.join(repo)
}
