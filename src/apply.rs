// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sync plan execution.
//!
//! Apply the mutations a [`SyncPlan`] calls for: create and repair symlinks,
//! optionally unlink orphans, then prune category directories left empty.
//! Failures are isolated per item and collected into the report; one bad
//! link never aborts the rest of the plan.
//!
//! Links are created _relative_ to their own parent directory, so a whole
//! tree (code store and workspaces together) can be relocated without
//! breaking every link.
//!
//! Dry-run replaces each mutating step with a no-op that still reports what
//! would happen, with identical tallying, so preview output and real output
//! share one code path up to the point of actual I/O.

use crate::{
    model::{Manifest, SyncPlan},
    path::relative_to,
    reconcile::{symlink_path, symlink_target},
    validate::{validate, Finding},
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Knobs for plan execution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Report every step without touching the filesystem.
    pub dry_run: bool,

    /// Unlink symlinks that no manifest entry claims.
    pub remove_orphans: bool,
}

/// Tally of what plan execution did (or would do, under dry-run).
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ApplyReport {
    /// Links created, as `workspace/category/name` locations.
    pub created: Vec<String>,

    /// Links repointed at the right target.
    pub updated: Vec<String>,

    /// Orphaned links unlinked.
    pub removed: Vec<String>,

    /// Empty category directories pruned.
    pub pruned: Vec<PathBuf>,

    /// Per-item failures, with enough context to locate each one.
    pub errors: Vec<String>,
}

impl ApplyReport {
    /// Check if any per-item failure was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Apply a sync plan to the filesystem.
///
/// Conflict items in the plan are never attempted; they are report-only.
/// After all link work, every workspace tree is pruned of empty category
/// directories bottom-up, never touching the workspace root itself.
///
/// # Errors
///
/// - Return [`ApplyError::Blocked`] if validation reports any blocking
///   finding; a manifest whose topology cannot be realized must be fixed
///   before anything is mutated.
#[instrument(skip(manifest, plan), level = "debug")]
pub fn apply(manifest: &Manifest, plan: &SyncPlan, options: ApplyOptions) -> Result<ApplyReport> {
    let blocking: Vec<Finding> = validate(manifest)
        .into_iter()
        .filter(Finding::is_blocking)
        .collect();
    if !blocking.is_empty() {
        return Err(ApplyError::Blocked { findings: blocking });
    }

    let mut report = ApplyReport::default();

    for item in &plan.symlinks_to_create {
        let Some(workspace) = manifest.get_workspace(&item.workspace) else {
            report
                .errors
                .push(format!("unknown workspace in plan: {}", item.workspace));
            continue;
        };
        let link = symlink_path(&workspace.path, &item.category, &item.symlink_name);
        let target = symlink_target(&manifest.code_path, &item.repo_name);

        match create_link(&link, &target, options.dry_run) {
            Ok(()) => report.created.push(item.to_string()),
            Err(error) => {
                warn!("failed to create {:?}: {error}", link.display());
                report
                    .errors
                    .push(format!("failed to create {}: {error}", link.display()));
            }
        }
    }

    for item in &plan.symlinks_to_update {
        let Some(workspace) = manifest.get_workspace(&item.workspace) else {
            report
                .errors
                .push(format!("unknown workspace in plan: {}", item.workspace));
            continue;
        };
        let link = symlink_path(&workspace.path, &item.category, &item.symlink_name);
        let target = symlink_target(&manifest.code_path, &item.repo_name);

        match update_link(&link, &target, options.dry_run) {
            Ok(()) => report.updated.push(item.to_string()),
            Err(error) => {
                warn!("failed to update {:?}: {error}", link.display());
                report
                    .errors
                    .push(format!("failed to update {}: {error}", link.display()));
            }
        }
    }

    if options.remove_orphans {
        for item in &plan.symlinks_to_remove {
            let Some(workspace) = manifest.get_workspace(&item.workspace) else {
                report
                    .errors
                    .push(format!("unknown workspace in plan: {}", item.workspace));
                continue;
            };
            let link = symlink_path(&workspace.path, &item.category, &item.symlink_name);

            match remove_link(&link, options.dry_run) {
                Ok(true) => report.removed.push(item.to_string()),
                // The position stopped being a symlink since plan time.
                // Never delete real data; skip silently.
                Ok(false) => {}
                Err(error) => {
                    warn!("failed to remove {:?}: {error}", link.display());
                    report
                        .errors
                        .push(format!("failed to remove {}: {error}", link.display()));
                }
            }
        }
    }

    for workspace in manifest.workspaces.values() {
        report
            .pruned
            .extend(prune_empty_dirs(&workspace.path, options.dry_run));
    }

    debug!(
        created = report.created.len(),
        updated = report.updated.len(),
        removed = report.removed.len(),
        errors = report.errors.len(),
        "applied sync plan"
    );

    Ok(report)
}

/// Create a relative symlink at `link` reaching `target`.
fn create_link(link: &Path, target: &Path, dry_run: bool) -> std::io::Result<()> {
    if dry_run {
        return Ok(());
    }

    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    mkdirp::mkdirp(parent)?;
    std::os::unix::fs::symlink(relative_to(target, parent), link)
}

/// Repoint an existing symlink by unlinking and recreating it.
fn update_link(link: &Path, target: &Path, dry_run: bool) -> std::io::Result<()> {
    if dry_run {
        return Ok(());
    }

    if fs::symlink_metadata(link)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
    {
        fs::remove_file(link)?;
    }

    create_link(link, target, false)
}

/// Unlink a symlink, re-verifying it still is one right before unlinking.
///
/// Returns whether the link was (or would be) removed. A position that
/// turned into a real object since plan time reports `false`.
fn remove_link(link: &Path, dry_run: bool) -> std::io::Result<bool> {
    let is_symlink = fs::symlink_metadata(link)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    if !is_symlink {
        return Ok(false);
    }

    if !dry_run {
        fs::remove_file(link)?;
    }

    Ok(true)
}

/// Prune now-empty category directories bottom-up.
///
/// Never removes the workspace root itself. Symlinks and files count as
/// content; a directory that fails to read or remove is left alone. Returns
/// the directories removed (or that would be, under dry-run).
pub fn prune_empty_dirs(workspace_path: &Path, dry_run: bool) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    prune_dir(workspace_path, workspace_path, dry_run, &mut removed);
    removed
}

fn prune_dir(dir: &Path, root: &Path, dry_run: bool, removed: &mut Vec<PathBuf>) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    let mut has_content = false;
    for entry in entries.flatten() {
        let is_real_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir() && !file_type.is_symlink())
            .unwrap_or(false);
        if is_real_dir {
            if !prune_dir(&entry.path(), root, dry_run, removed) {
                has_content = true;
            }
        } else {
            has_content = true;
        }
    }

    if has_content || dir == root {
        return false;
    }

    if !dry_run && fs::remove_dir(dir).is_err() {
        return false;
    }

    removed.push(dir.to_path_buf());
    true
}

/// Plan execution error types.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Validation reports a topology that cannot be realized on disk.
    #[error("manifest has {} blocking conflict(s); refusing to apply", findings.len())]
    Blocked {
        /// The blocking findings, in validation order.
        findings: Vec<Finding>,
    },
}

/// Friendly result alias :3
type Result<T, E = ApplyError> = std::result::Result<T, E>;
