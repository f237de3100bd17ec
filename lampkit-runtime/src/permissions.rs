//! Recursive ownership and mode normalisation for one clone tree.
//!
//! Symlinks inside the tree are never followed: their group is changed with
//! `lchown` and their mode is left alone (Linux ignores symlink modes).

use std::fs;
use std::os::unix::fs::{lchown, PermissionsExt};
use std::path::Path;

use nix::unistd::Group;
use walkdir::WalkDir;

use lampkit_core::PermissionPolicy;

use crate::error::{publish_io, PublishError};

/// Any of `u+x`, `g+x`, `o+x`.
const ANY_EXEC: u32 = 0o111;

/// Counts of entries touched by [`normalise_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub dirs: usize,
    pub files: usize,
    pub executables: usize,
    pub symlinks: usize,
}

/// Resolve a group name to its gid.
pub fn resolve_group(name: &str) -> Result<u32, PublishError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(PublishError::GroupNotFound {
            group: name.to_string(),
        }),
        Err(source) => Err(PublishError::GroupLookup {
            group: name.to_string(),
            source,
        }),
    }
}

/// Mode a regular file ends up with under `policy`.
pub fn target_file_mode(current: u32, policy: &PermissionPolicy) -> u32 {
    if current & ANY_EXEC != 0 {
        policy.exec_mode.bits()
    } else {
        policy.file_mode.bits()
    }
}

/// Walk `root`, chgrp every entry to `gid` (when given) and apply the
/// policy's modes. Contents are visited before their directory so a
/// restrictive `dir_mode` never blocks the walk.
pub fn normalise_tree(
    root: &Path,
    policy: &PermissionPolicy,
    gid: Option<u32>,
) -> Result<TreeStats, PublishError> {
    let mut stats = TreeStats::default();

    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|source| PublishError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type();

        if let Some(gid) = gid {
            lchown(path, None, Some(gid)).map_err(|e| publish_io(path, e))?;
        }

        if file_type.is_symlink() {
            stats.symlinks += 1;
            continue;
        }

        let mode = if file_type.is_dir() {
            stats.dirs += 1;
            policy.dir_mode.bits()
        } else {
            let current = entry
                .metadata()
                .map_err(|source| PublishError::Walk {
                    path: path.to_path_buf(),
                    source,
                })?
                .permissions()
                .mode();
            let mode = target_file_mode(current, policy);
            if current & ANY_EXEC != 0 {
                stats.executables += 1;
            }
            stats.files += 1;
            mode
        };

        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| publish_io(path, e))?;
    }

    Ok(stats)
}
