// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevant path information for the manifest file and the
//! symlinks that grove manages. Nothing here checks that a returned path
//! actually exists.

use std::path::{Component, Path, PathBuf};

/// Determine absolute path to user's home directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the manifest file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/grove/config.toml` as the
/// default location of the manifest.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_manifest_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("grove").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Compute the relative path that reaches `target` from directory `base`.
///
/// Used to create relative symlinks so workspaces stay portable when the
/// whole tree (code store and workspaces together) is relocated. Both
/// arguments must be absolute; neither is resolved against the filesystem.
pub fn relative_to(target: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let mut target_parts = target.as_ref().components().peekable();
    let mut base_parts = base.as_ref().components().peekable();

    // Drop the shared prefix.
    while let (Some(lhs), Some(rhs)) = (target_parts.peek(), base_parts.peek()) {
        if lhs != rhs {
            break;
        }
        target_parts.next();
        base_parts.next();
    }

    let mut relative = PathBuf::new();
    for part in base_parts {
        if part != Component::RootDir {
            relative.push("..");
        }
    }
    for part in target_parts {
        relative.push(part);
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }

    relative
}

/// Render a path with the user's home directory contracted back to `~`.
///
/// Paths outside the home directory render unchanged.
pub fn contract_home(path: impl AsRef<Path>) -> String {
    if let Ok(home) = home_dir() {
        if let Ok(relative) = path.as_ref().strip_prefix(&home) {
            if relative.as_os_str().is_empty() {
                return "~".into();
            }
            return format!("~/{}", relative.display());
        }
    }

    path.as_ref().display().to_string()
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
