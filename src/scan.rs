// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem scanning.
//!
//! Answer read-only queries about the code store and workspace trees. The
//! scanner never mutates the filesystem, and it never caches: every query
//! reads fresh state, because the filesystem may change between calls.
//!
//! # Walk Rules
//!
//! Workspace walks are explicit stack-based traversals over sorted directory
//! entries, which keeps results deterministic. Two rules hold everywhere:
//!
//! 1. A symlink is a terminal finding. It is never recursed into, even when
//!    its target is a directory.
//! 2. For the non-symlink walk, a real directory containing `.git` is a leaf
//!    (a candidate direct clone); a real directory without `.git` is a
//!    category container and is walked into.
//!
//! A nonexistent root yields empty results rather than an error; the caller
//! surfaces missing paths as validation warnings instead.

use crate::model::ROOT_CATEGORY;

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, DirEntry},
    io,
    path::{Path, PathBuf},
};
use tracing::{instrument, trace};

/// Ceiling on workspace walk depth.
///
/// Workspace trees are shallow by convention. The cap bounds runaway
/// traversal if a tree ever cycles through a non-symlink mount.
const MAX_WALK_DEPTH: usize = 64;

/// Scan the code store for git repositories.
///
/// Reports every immediate child directory of `code_path` that contains a
/// `.git` entry, in sorted order. Non-directories and directories lacking
/// `.git` are excluded. A nonexistent `code_path` yields an empty set.
///
/// # Errors
///
/// - Return [`ScanError`] if directory contents cannot be read.
#[instrument(level = "debug")]
pub fn scan_code_store(code_path: impl AsRef<Path> + std::fmt::Debug) -> Result<BTreeSet<String>> {
    let code_path = code_path.as_ref();
    if !code_path.exists() {
        return Ok(BTreeSet::new());
    }

    let mut repos = BTreeSet::new();
    for entry in sorted_entries(code_path)? {
        let path = entry.path();
        if path.is_dir() && path.join(".git").exists() {
            repos.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }

    trace!("found {} repos in {:?}", repos.len(), code_path.display());
    Ok(repos)
}

/// Scan the code store for directories that are not git repositories.
///
/// These usually signal a failed or half-finished clone. Symlinks are
/// excluded. A nonexistent `code_path` yields an empty set.
///
/// # Errors
///
/// - Return [`ScanError`] if directory contents cannot be read.
#[instrument(level = "debug")]
pub fn scan_non_repo_dirs(code_path: impl AsRef<Path> + std::fmt::Debug) -> Result<BTreeSet<String>> {
    let code_path = code_path.as_ref();
    if !code_path.exists() {
        return Ok(BTreeSet::new());
    }

    let mut non_repos = BTreeSet::new();
    for entry in sorted_entries(code_path)? {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| ScanError {
            path: path.clone(),
            source,
        })?;
        if path.is_dir() && !file_type.is_symlink() && !path.join(".git").exists() {
            non_repos.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }

    Ok(non_repos)
}

/// Scan a workspace tree for symlinks.
///
/// Returns link names grouped by the category path built from the directory
/// names traversed to reach them; links at the workspace root group under
/// [`ROOT_CATEGORY`]. A nonexistent workspace yields an empty mapping.
///
/// # Errors
///
/// - Return [`ScanError`] if directory contents cannot be read.
#[instrument(level = "debug")]
pub fn scan_workspace_symlinks(
    workspace_path: impl AsRef<Path> + std::fmt::Debug,
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let workspace_path = workspace_path.as_ref();
    let mut found: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    if !workspace_path.exists() {
        return Ok(found);
    }

    let mut stack: Vec<(PathBuf, String, usize)> =
        vec![(workspace_path.to_path_buf(), String::new(), 0)];
    while let Some((dir, prefix, depth)) = stack.pop() {
        for entry in sorted_entries(&dir)? {
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| ScanError {
                path: path.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_symlink() {
                found
                    .entry(category_key(&prefix))
                    .or_default()
                    .insert(name);
            } else if file_type.is_dir() && depth < MAX_WALK_DEPTH {
                stack.push((path, extend_prefix(&prefix, &name), depth + 1));
            }
        }
    }

    Ok(found)
}

/// Scan a workspace tree for real checkout directories.
///
/// A non-symlink directory containing `.git` is recorded as a candidate
/// direct clone under its category path and not walked into further; one
/// lacking `.git` is treated as a category container and walked into.
/// Symlinks are skipped entirely. A nonexistent workspace yields an empty
/// mapping.
///
/// # Errors
///
/// - Return [`ScanError`] if directory contents cannot be read.
#[instrument(level = "debug")]
pub fn scan_workspace_non_symlinks(
    workspace_path: impl AsRef<Path> + std::fmt::Debug,
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let workspace_path = workspace_path.as_ref();
    let mut found: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    if !workspace_path.exists() {
        return Ok(found);
    }

    let mut stack: Vec<(PathBuf, String, usize)> =
        vec![(workspace_path.to_path_buf(), String::new(), 0)];
    while let Some((dir, prefix, depth)) = stack.pop() {
        for entry in sorted_entries(&dir)? {
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| ScanError {
                path: path.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_symlink() || !file_type.is_dir() {
                continue;
            }

            if path.join(".git").exists() {
                found
                    .entry(category_key(&prefix))
                    .or_default()
                    .insert(name);
            } else if depth < MAX_WALK_DEPTH {
                stack.push((path, extend_prefix(&prefix, &name), depth + 1));
            }
        }
    }

    Ok(found)
}

fn category_key(prefix: &str) -> String {
    if prefix.is_empty() {
        ROOT_CATEGORY.into()
    } else {
        prefix.into()
    }
}

fn extend_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.into()
    } else {
        format!("{prefix}/{name}")
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .and_then(|entries| entries.collect::<io::Result<Vec<_>>>())
        .map_err(|source| ScanError {
            path: dir.to_path_buf(),
            source,
        })?;
    entries.sort_by_key(DirEntry::file_name);
    Ok(entries)
}

/// Filesystem read failure during a scan.
///
/// Fatal to an in-progress reconciliation: a partial scan could silently
/// omit real orphans, so the whole pass is abandoned instead.
#[derive(Debug, thiserror::Error)]
#[error("cannot scan {path}")]
pub struct ScanError {
    /// Path whose contents could not be read.
    pub path: PathBuf,

    /// Underlying I/O failure.
    pub source: std::io::Error,
}

/// Friendly result alias :3
type Result<T, E = ScanError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::os::unix::fs::symlink;

    fn fake_repo(path: &str) {
        fs::create_dir_all(format!("{path}/.git")).unwrap();
    }

    #[sealed_test]
    fn scan_code_store_reports_git_dirs_only() -> anyhow::Result<()> {
        fake_repo("code/zeta");
        fake_repo("code/alpha");
        fs::create_dir_all("code/not-a-repo")?;
        fs::write("code/stray-file", "")?;

        let result = scan_code_store("code")?;
        let expect: BTreeSet<String> = ["alpha".into(), "zeta".into()].into();
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn scan_code_store_missing_root_is_empty() -> anyhow::Result<()> {
        assert!(scan_code_store("does-not-exist")?.is_empty());
        Ok(())
    }

    #[sealed_test]
    fn scan_non_repo_dirs_skips_repos_and_symlinks() -> anyhow::Result<()> {
        fake_repo("code/real-repo");
        fs::create_dir_all("code/half-clone")?;
        fs::create_dir_all("elsewhere")?;
        symlink("../elsewhere", "code/linked")?;

        let result = scan_non_repo_dirs("code")?;
        let expect: BTreeSet<String> = ["half-clone".into()].into();
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn scan_workspace_symlinks_groups_by_category() -> anyhow::Result<()> {
        fake_repo("code/foo");
        fake_repo("code/bar");
        fs::create_dir_all("workspace/acme/tools")?;
        symlink("../code/foo", "workspace/foo")?;
        symlink("../../../code/bar", "workspace/acme/tools/bar")?;

        let result = scan_workspace_symlinks("workspace")?;
        let mut expect: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        expect.insert(".".into(), ["foo".into()].into());
        expect.insert("acme/tools".into(), ["bar".into()].into());
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn scan_workspace_symlinks_never_walks_into_links() -> anyhow::Result<()> {
        // A symlinked directory full of other symlinks stays terminal.
        fs::create_dir_all("other/deep")?;
        symlink("../code", "other/deep/inner")?;
        fs::create_dir_all("workspace")?;
        symlink("../other", "workspace/other")?;

        let result = scan_workspace_symlinks("workspace")?;
        let mut expect: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        expect.insert(".".into(), ["other".into()].into());
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn scan_workspace_non_symlinks_treats_git_dirs_as_leaves() -> anyhow::Result<()> {
        fake_repo("workspace/direct-clone");
        fs::create_dir_all("workspace/acme")?;
        fake_repo("workspace/acme/nested-clone");
        fs::create_dir_all("workspace/empty-category")?;
        symlink("../code/foo", "workspace/linked")?;

        let result = scan_workspace_non_symlinks("workspace")?;
        let mut expect: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        expect.insert(".".into(), ["direct-clone".into()].into());
        expect.insert("acme".into(), ["nested-clone".into()].into());
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn nested_clone_internals_stay_hidden() -> anyhow::Result<()> {
        // Directories inside a checkout must not leak out as categories.
        fake_repo("workspace/clone");
        fs::create_dir_all("workspace/clone/src")?;
        symlink("../../code/foo", "workspace/clone/inner-link")?;

        let result = scan_workspace_non_symlinks("workspace")?;
        let mut expect: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        expect.insert(".".into(), ["clone".into()].into());
        assert_eq!(result, expect);

        Ok(())
    }
}
