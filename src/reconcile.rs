// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconciliation of declared state against disk state.
//!
//! Diff the manifest against fresh scans of the code store and every
//! workspace tree, producing a [`SyncPlan`] of the minimal mutations needed
//! plus the diagnostics that need human eyes (conflicts, orphans, foreign
//! directories). Reconciliation never mutates anything: the plan is handed
//! to [`crate::apply`] or to a read-only reporting path.
//!
//! # Determinism
//!
//! Two consecutive reconciliations of unchanged state produce identical
//! plans. Repo-set differences come out lexicographically sorted; the
//! declared-side lists (create, update, conflict) follow manifest order; the
//! disk-side lists (remove, foreign dirs) follow sorted scan order.
//!
//! # Failure
//!
//! The only failure mode is a scanner I/O error, which abandons the whole
//! pass. A plan computed from a partial scan could silently omit real
//! orphans, so no partial plan is ever produced.

use crate::{
    model::{ForeignDir, LinkItem, Manifest, OrphanItem, SyncPlan, ROOT_CATEGORY},
    scan::{scan_code_store, scan_workspace_non_symlinks, scan_workspace_symlinks, ScanError},
};

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Observed state of one declared symlink position on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A symlink resolving to the expected target.
    Ok,

    /// Nothing occupies the position.
    Missing,

    /// A symlink resolving elsewhere, or failing to resolve at all.
    WrongTarget,

    /// A real filesystem object occupies the position.
    NotSymlink,
}

/// Classify the live filesystem state at a declared symlink position.
///
/// Resolution failures on an existing symlink (a dangling link, or an
/// unreadable target) classify as [`LinkState::WrongTarget`] so the link
/// gets repaired rather than ignored.
pub fn classify_link(link_path: &Path, expected_target: &Path) -> LinkState {
    let Ok(metadata) = fs::symlink_metadata(link_path) else {
        return LinkState::Missing;
    };

    if !metadata.file_type().is_symlink() {
        return LinkState::NotSymlink;
    }

    match (fs::canonicalize(link_path), fs::canonicalize(expected_target)) {
        (Ok(actual), Ok(expected)) if actual == expected => LinkState::Ok,
        _ => LinkState::WrongTarget,
    }
}

/// Full path a declared symlink occupies inside its workspace.
pub fn symlink_path(workspace_path: &Path, category_path: &str, symlink_name: &str) -> PathBuf {
    if category_path == ROOT_CATEGORY {
        workspace_path.join(symlink_name)
    } else {
        workspace_path.join(category_path).join(symlink_name)
    }
}

/// Full path a declared symlink must resolve to.
pub fn symlink_target(code_path: &Path, repo_name: &str) -> PathBuf {
    code_path.join(repo_name)
}

/// Diff declared state against scanned disk state into a sync plan.
///
/// Every scan runs fresh within this call. See the module docs for ordering
/// guarantees.
///
/// # Errors
///
/// - Return [`ScanError`] if any filesystem scan fails; no partial plan is
///   produced.
#[instrument(skip(manifest), level = "debug")]
pub fn reconcile(manifest: &Manifest) -> Result<SyncPlan> {
    let code_repos = scan_code_store(&manifest.code_path)?;
    let declared_repos = manifest.all_repos();

    let mut plan = SyncPlan {
        repos_to_add: code_repos.difference(&declared_repos).cloned().collect(),
        repos_missing: declared_repos.difference(&code_repos).cloned().collect(),
        ..Default::default()
    };

    for (ws_name, workspace) in &manifest.workspaces {
        for (cat_path, category) in &workspace.categories {
            for entry in &category.entries {
                let link_path = symlink_path(&workspace.path, cat_path, entry.symlink_name());
                let target = symlink_target(&manifest.code_path, &entry.repo_name);
                let item = LinkItem {
                    workspace: ws_name.clone(),
                    category: cat_path.clone(),
                    repo_name: entry.repo_name.clone(),
                    symlink_name: entry.symlink_name().to_owned(),
                };

                match classify_link(&link_path, &target) {
                    LinkState::Ok => {}
                    // Creating or repairing a link to a repo that is not in
                    // the code store would only manufacture a dangling
                    // link. The repo's absence is already surfaced through
                    // `repos_missing`, so such entries drop out silently.
                    LinkState::Missing => {
                        if code_repos.contains(&entry.repo_name) {
                            plan.symlinks_to_create.push(item);
                        }
                    }
                    LinkState::WrongTarget => {
                        if code_repos.contains(&entry.repo_name) {
                            plan.symlinks_to_update.push(item);
                        }
                    }
                    // Reportable whether or not the repo exists, since a
                    // real object blocks reconciliation either way.
                    LinkState::NotSymlink => plan.symlink_conflicts.push(item),
                }
            }
        }

        // Orphans key on symlink name, not repo name: the link name is what
        // physically exists on disk.
        let on_disk = scan_workspace_symlinks(&workspace.path)?;
        for (cat_path, link_names) in &on_disk {
            let declared: BTreeSet<String> = workspace
                .get_category(cat_path)
                .map(|category| category.symlink_names())
                .unwrap_or_default();
            for link_name in link_names {
                if !declared.contains(link_name) {
                    plan.symlinks_to_remove.push(OrphanItem {
                        workspace: ws_name.clone(),
                        category: cat_path.clone(),
                        symlink_name: link_name.clone(),
                    });
                }
            }
        }
    }

    for (ws_name, workspace) in &manifest.workspaces {
        let foreign = scan_workspace_non_symlinks(&workspace.path)?;
        for (cat_path, dir_names) in &foreign {
            for dir_name in dir_names {
                plan.non_symlink_dirs.push(ForeignDir {
                    workspace: ws_name.clone(),
                    category: cat_path.clone(),
                    dir_name: dir_name.clone(),
                });
            }
        }
    }

    debug!(
        create = plan.symlinks_to_create.len(),
        update = plan.symlinks_to_update.len(),
        remove = plan.symlinks_to_remove.len(),
        conflicts = plan.symlink_conflicts.len(),
        "reconciled manifest against disk state"
    );

    Ok(plan)
}

/// Friendly result alias :3
type Result<T, E = ScanError> = std::result::Result<T, E>;
