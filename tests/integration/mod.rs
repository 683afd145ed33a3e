// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use grove::{
    apply::{apply, ApplyError, ApplyOptions},
    config::load_manifest,
    model::{LinkItem, Manifest, RepoEntry, Workspace},
    reconcile::reconcile,
    remote::suggest_category,
};

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    fs,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

/// Manifest rooted in the current scratch directory, declaring one
/// workspace named "workspace".
fn scratch_manifest(root: &Path) -> Manifest {
    let mut manifest = Manifest {
        code_path: root.join("code"),
        ..Default::default()
    };
    let workspace = Workspace::new(root.join("workspace"));
    manifest.workspaces.insert(workspace.name(), workspace);
    manifest
}

fn declare(manifest: &mut Manifest, category: &str, entry: RepoEntry) {
    manifest
        .workspaces
        .get_mut("workspace")
        .unwrap()
        .get_or_create_category(category)
        .entries
        .push(entry);
}

#[sealed_test]
fn create_links_at_root_and_under_categories() -> Result<()> {
    let root = std::env::current_dir()?;
    let fixture = RepoFixture::new("code/my-repo")?;
    fixture.stage_and_commit("README.md", "# my-repo\n")?;
    RepoFixture::new("code/acme-code")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("my-repo"));
    declare(&mut manifest, "tools", RepoEntry::with_alias("acme-code", "git"));

    let plan = reconcile(&manifest)?;
    assert_eq!(plan.symlinks_to_create.len(), 2);
    assert!(plan.repos_to_add.is_empty());
    assert!(plan.repos_missing.is_empty());

    let report = apply(&manifest, &plan, ApplyOptions::default())?;
    assert_eq!(report.created.len(), 2);
    assert!(!report.has_errors());

    assert_eq!(
        fs::read_link("workspace/my-repo")?,
        PathBuf::from("../code/my-repo")
    );
    assert_eq!(
        fs::canonicalize("workspace/tools/git")?,
        fs::canonicalize("code/acme-code")?
    );

    // Converged: a second pass finds nothing to do.
    let plan = reconcile(&manifest)?;
    assert!(!plan.has_changes());
    assert!(!plan.has_warnings());

    Ok(())
}

#[sealed_test]
fn real_directory_at_declared_position_is_never_touched() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/proj")?;
    fs::create_dir_all("workspace/proj")?;
    fs::write("workspace/proj/precious", "data")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("proj"));

    let plan = reconcile(&manifest)?;
    assert!(plan.symlinks_to_create.is_empty());
    assert_eq!(
        plan.symlink_conflicts,
        vec![LinkItem {
            workspace: "workspace".into(),
            category: ".".into(),
            repo_name: "proj".into(),
            symlink_name: "proj".into(),
        }]
    );

    let report = apply(&manifest, &plan, ApplyOptions::default())?;
    assert!(!report.has_errors());
    assert!(Path::new("workspace/proj/precious").exists());
    assert!(!fs::symlink_metadata("workspace/proj")?.file_type().is_symlink());

    Ok(())
}

#[sealed_test]
fn blocking_topology_refuses_to_apply() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/tools")?;
    RepoFixture::new("code/other")?;
    fs::create_dir_all("workspace")?;

    // Category "tools/misc" needs a directory where the root category
    // already declares a link named "tools".
    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("tools"));
    declare(&mut manifest, "tools/misc", RepoEntry::new("other"));

    let plan = reconcile(&manifest)?;
    let result = apply(&manifest, &plan, ApplyOptions::default());
    assert!(matches!(result, Err(ApplyError::Blocked { .. })));
    assert!(!Path::new("workspace/tools").exists());

    Ok(())
}

#[sealed_test]
fn orphans_removed_only_on_request_then_empty_dirs_pruned() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/foo")?;
    fs::create_dir_all("workspace/tools")?;
    symlink(root.join("code/foo"), "workspace/tools/stale")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("foo"));

    let plan = reconcile(&manifest)?;
    assert_eq!(plan.symlinks_to_remove.len(), 1);
    assert_eq!(plan.symlinks_to_remove[0].symlink_name, "stale");

    // Default run leaves orphans alone.
    let report = apply(&manifest, &plan, ApplyOptions::default())?;
    assert!(report.removed.is_empty());
    assert!(fs::symlink_metadata("workspace/tools/stale").is_ok());

    // Opting in unlinks the orphan and prunes the now-empty category
    // directory, sparing the workspace root.
    let plan = reconcile(&manifest)?;
    let report = apply(
        &manifest,
        &plan,
        ApplyOptions {
            remove_orphans: true,
            ..Default::default()
        },
    )?;
    assert_eq!(report.removed, vec!["workspace/tools/stale".to_string()]);
    assert_eq!(report.pruned, vec![root.join("workspace/tools")]);
    assert!(!Path::new("workspace/tools").exists());
    assert!(Path::new("workspace").exists());

    Ok(())
}

#[sealed_test]
fn wrong_target_links_get_repointed() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/foo")?;
    RepoFixture::new("code/bar")?;
    fs::create_dir_all("workspace")?;
    symlink(root.join("code/bar"), "workspace/foo")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("foo"));
    declare(&mut manifest, ".", RepoEntry::new("bar"));

    let plan = reconcile(&manifest)?;
    assert_eq!(plan.symlinks_to_update.len(), 1);
    assert_eq!(plan.symlinks_to_create.len(), 1);

    let report = apply(&manifest, &plan, ApplyOptions::default())?;
    assert_eq!(report.updated, vec!["workspace/foo".to_string()]);
    assert_eq!(
        fs::canonicalize("workspace/foo")?,
        fs::canonicalize("code/foo")?
    );

    Ok(())
}

#[sealed_test]
fn dry_run_tallies_everything_and_touches_nothing() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/my-repo")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, "tools", RepoEntry::new("my-repo"));

    let plan = reconcile(&manifest)?;
    let report = apply(
        &manifest,
        &plan,
        ApplyOptions {
            dry_run: true,
            ..Default::default()
        },
    )?;

    assert_eq!(report.created, vec!["workspace/tools/my-repo".to_string()]);
    assert!(!Path::new("workspace/tools").exists());

    // Nothing moved, so the plan comes out identical.
    assert_eq!(reconcile(&manifest)?, plan);

    Ok(())
}

#[sealed_test]
fn declared_repo_missing_from_code_store_is_reported() -> Result<()> {
    let root = std::env::current_dir()?;
    fs::create_dir_all("code")?;
    fs::create_dir_all("workspace")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("ghost"));

    let plan = reconcile(&manifest)?;
    assert_eq!(plan.repos_missing, vec!["ghost".to_string()]);
    assert!(plan.symlinks_to_create.is_empty());

    let report = apply(&manifest, &plan, ApplyOptions::default())?;
    assert!(!report.has_errors());
    assert!(!Path::new("workspace/ghost").exists());

    Ok(())
}

#[sealed_test]
fn undeclared_repo_in_code_store_is_surfaced() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/known")?;
    RepoFixture::new("code/newcomer")?;

    let mut manifest = scratch_manifest(&root);
    declare(&mut manifest, ".", RepoEntry::new("known"));

    let plan = reconcile(&manifest)?;
    assert_eq!(plan.repos_to_add, vec!["newcomer".to_string()]);

    Ok(())
}

#[sealed_test]
fn remote_org_suggests_a_category_for_new_clones() -> Result<()> {
    let fixture = RepoFixture::new("code/widget")?;
    fixture.add_remote("origin", "git@github.com:acme/widget.git")?;

    assert_eq!(
        suggest_category(Path::new("code/widget")),
        Some("acme".to_string())
    );

    Ok(())
}

#[sealed_test]
fn loaded_manifest_drives_a_full_cycle() -> Result<()> {
    let root = std::env::current_dir()?;
    RepoFixture::new("code/my-repo")?;
    RepoFixture::new("code/acme-code")?;

    let content = format!(
        "code = {code:?}\n\"{ws}\" = {{ \".\" = [\"my-repo\"], \"tools\" = [\"acme-code:git\"] }}\n",
        code = root.join("code"),
        ws = root.join("workspace").display(),
    );
    fs::write("config.toml", content)?;

    let manifest = load_manifest(Path::new("config.toml"))?;
    let plan = reconcile(&manifest)?;
    let report = apply(&manifest, &plan, ApplyOptions::default())?;

    assert_eq!(report.created.len(), 2);
    assert!(!report.has_errors());
    assert_eq!(
        fs::canonicalize("workspace/tools/git")?,
        fs::canonicalize("code/acme-code")?
    );

    Ok(())
}
