// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Adoption of pre-existing workspace symlinks.
//!
//! A workspace that was curated by hand (or by an older tool) already holds
//! symlinks into the code store that the manifest knows nothing about. The
//! adoption scan walks such a workspace and turns every link resolving into
//! the code store back into a declaration, so the manifest can take
//! ownership of it. Links whose name differs from the target checkout name
//! become aliased entries.
//!
//! Broken links and links escaping the code store are skipped with a
//! warning; they are diagnostics for the user, never errors.

use crate::{
    model::{RepoEntry, Workspace, ROOT_CATEGORY},
    scan::ScanError,
};

use std::{fs, io, path::{Path, PathBuf}};
use tracing::instrument;

/// One adoptable declaration discovered on disk.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Adoption {
    /// Category path the link was found under.
    pub category: String,

    /// Entry reconstructed from the link name and its target.
    pub entry: RepoEntry,
}

/// Result of an adoption scan: declarations found, plus skip warnings.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct AdoptionScan {
    /// Adoptable entries in walk order.
    pub adoptions: Vec<Adoption>,

    /// Human-readable reasons for every skipped link.
    pub warnings: Vec<String>,
}

/// Scan a workspace for symlinks that can be adopted into the manifest.
///
/// A nonexistent workspace yields an empty scan.
///
/// # Errors
///
/// - Return [`ScanError`] if directory contents cannot be read.
#[instrument(skip(workspace), level = "debug")]
pub fn adopt_workspace_symlinks(
    workspace: &Workspace,
    code_path: &Path,
) -> Result<AdoptionScan, ScanError> {
    let mut scan = AdoptionScan::default();
    if !workspace.path.exists() {
        return Ok(scan);
    }

    let code_root = fs::canonicalize(code_path).unwrap_or_else(|_| code_path.to_path_buf());

    let mut stack: Vec<(PathBuf, String)> = vec![(workspace.path.clone(), String::new())];
    while let Some((dir, prefix)) = stack.pop() {
        for entry in sorted_dir(&dir)? {
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| ScanError {
                path: path.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_symlink() {
                adopt_link(&path, &name, &prefix, &code_root, &mut scan);
            } else if file_type.is_dir() {
                let next = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                stack.push((path, next));
            }
        }
    }

    Ok(scan)
}

fn adopt_link(path: &Path, name: &str, prefix: &str, code_root: &Path, scan: &mut AdoptionScan) {
    let category = if prefix.is_empty() {
        ROOT_CATEGORY.to_string()
    } else {
        prefix.to_string()
    };

    let Ok(target) = fs::canonicalize(path) else {
        scan.warnings.push(format!("skipping {name} (broken symlink)"));
        return;
    };

    if !target.starts_with(code_root) {
        scan.warnings.push(format!(
            "skipping {name} -> {} (not in code directory)",
            target.display()
        ));
        return;
    }

    let repo_name = target
        .file_name()
        .map(|repo| repo.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entry = if name == repo_name {
        RepoEntry::new(repo_name)
    } else {
        RepoEntry::with_alias(repo_name, name)
    };

    scan.adoptions.push(Adoption { category, entry });
}

fn sorted_dir(dir: &Path) -> Result<Vec<fs::DirEntry>, ScanError> {
    let mut entries = fs::read_dir(dir)
        .and_then(|entries| entries.collect::<io::Result<Vec<_>>>())
        .map_err(|source| ScanError {
            path: dir.to_path_buf(),
            source,
        })?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}
