// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manifest data model.
//!
//! In-memory representation of the declared mapping between the code store
//! and curated workspace trees. The manifest is the sole source of truth for
//! _declared_ state; the filesystem remains the sole source of truth for
//! _actual_ state. Nothing in this module touches the filesystem.
//!
//! # Category Paths
//!
//! Categories are identified by slash-separated path strings relative to
//! their workspace root, e.g. `"acme/tools"`. The literal value `"."` is
//! reserved to mean "directly at the workspace root" with no subdirectory.
//! This string form is kept end to end so that diagnostics always reference
//! the exact text the user wrote in the manifest.

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Reserved category path naming the workspace root itself.
pub const ROOT_CATEGORY: &str = ".";

/// A declared repository placement.
///
/// The `repo_name` is the name of the actual checkout directory inside the
/// code store and acts as immutable identity. The optional `alias` overrides
/// the on-disk link name. Two entries are "the same repo" iff their
/// `repo_name` match; two entries collide iff their [`symlink_name`] match.
///
/// [`symlink_name`]: RepoEntry::symlink_name
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepoEntry {
    /// Directory name of the checkout inside the code store.
    pub repo_name: String,

    /// Optional override for the on-disk link name.
    pub alias: Option<String>,
}

impl RepoEntry {
    /// Construct new entry without an alias.
    pub fn new(repo_name: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            alias: None,
        }
    }

    /// Construct new entry with an alias link name.
    pub fn with_alias(repo_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Name the on-disk symlink will carry.
    pub fn symlink_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.repo_name)
    }
}

impl FromStr for RepoEntry {
    type Err = ParseEntryError;

    /// Parse persisted entry form: `repo_name` or `repo_name:alias`.
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let (name, alias) = match data.split_once(':') {
            Some((name, alias)) => (name.trim(), Some(alias.trim())),
            None => (data.trim(), None),
        };

        if name.is_empty() {
            return Err(ParseEntryError(data.into()));
        }

        Ok(Self {
            repo_name: name.into(),
            alias: alias.filter(|alias| !alias.is_empty()).map(Into::into),
        })
    }
}

impl Display for RepoEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.alias {
            Some(alias) => write!(fmt, "{}:{}", self.repo_name, alias),
            None => fmt.write_str(&self.repo_name),
        }
    }
}

/// Malformed repo entry string, e.g. empty name before the alias separator.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid repo entry {0:?}: repo name cannot be empty")]
pub struct ParseEntryError(pub String);

/// A named slot within a workspace holding a set of repo entries.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Category {
    /// Slash-separated path under the workspace root, or [`ROOT_CATEGORY`].
    pub path: String,

    /// Declared repo placements. Order carries no meaning.
    pub entries: Vec<RepoEntry>,
}

impl Category {
    /// Construct new empty category at target path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Check if this category links directly at the workspace root.
    pub fn is_root(&self) -> bool {
        self.path == ROOT_CATEGORY
    }

    /// Set of declared repo names. Duplicates collapse; they cannot occur
    /// through the persisted form anyway.
    pub fn repo_names(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|entry| entry.repo_name.clone())
            .collect()
    }

    /// Set of derived on-disk link names. Duplicates collapse here, but are
    /// a reportable condition caught by validation.
    pub fn symlink_names(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|entry| entry.symlink_name().to_owned())
            .collect()
    }
}

/// One destination directory tree presenting organized symlinks.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Workspace {
    /// Absolute filesystem location of the workspace root.
    pub path: PathBuf,

    /// Categories keyed by their path string. Keys stay unique, and the
    /// [`ROOT_CATEGORY`] key may be present or absent independently.
    pub categories: BTreeMap<String, Category>,
}

impl Workspace {
    /// Construct new workspace rooted at target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            categories: BTreeMap::new(),
        }
    }

    /// Display name of workspace, i.e., the last component of its path.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Look up a category by its path string.
    pub fn get_category(&self, category_path: &str) -> Option<&Category> {
        self.categories.get(category_path)
    }

    /// Look up a category, creating an empty one if absent.
    pub fn get_or_create_category(&mut self, category_path: &str) -> &mut Category {
        self.categories
            .entry(category_path.to_owned())
            .or_insert_with(|| Category::new(category_path))
    }

    /// Union of repo names across all categories.
    pub fn all_repos(&self) -> BTreeSet<String> {
        self.categories
            .values()
            .flat_map(Category::repo_names)
            .collect()
    }

    /// All category paths that declare target repo.
    pub fn find_repo_categories(&self, repo_name: &str) -> Vec<String> {
        self.categories
            .iter()
            .filter(|(_, category)| {
                category
                    .entries
                    .iter()
                    .any(|entry| entry.repo_name == repo_name)
            })
            .map(|(path, _)| path.clone())
            .collect()
    }
}

/// Top-level declared mapping between code store and workspaces.
///
/// Constructed by the manifest loader in [`crate::config`], mutated only by
/// CLI operations that declare new repos or categories, and read by the
/// validation and reconciliation passes. Reconciliation never mutates it.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Absolute path to the flat store of git checkouts.
    pub code_path: PathBuf,

    /// Workspaces keyed by display name (path basename). Keys stay unique;
    /// a basename collision between distinct paths is a load-time error.
    pub workspaces: BTreeMap<String, Workspace>,

    /// Optional default directory for the VS Code workspace-file export.
    pub vscode_export_path: Option<PathBuf>,
}

impl Manifest {
    /// Look up a workspace by display name.
    pub fn get_workspace(&self, name: &str) -> Option<&Workspace> {
        self.workspaces.get(name)
    }

    /// Union of repo names declared across all workspaces.
    pub fn all_repos(&self) -> BTreeSet<String> {
        self.workspaces
            .values()
            .flat_map(Workspace::all_repos)
            .collect()
    }

    /// All `(workspace_name, category_path)` pairs declaring target repo.
    pub fn find_repo_locations(&self, repo_name: &str) -> Vec<(String, String)> {
        self.workspaces
            .iter()
            .flat_map(|(ws_name, workspace)| {
                workspace
                    .find_repo_categories(repo_name)
                    .into_iter()
                    .map(|cat_path| (ws_name.clone(), cat_path))
            })
            .collect()
    }
}

/// A planned symlink create, update, or conflict report.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct LinkItem {
    /// Display name of the workspace the link lives in.
    pub workspace: String,

    /// Category path string within the workspace.
    pub category: String,

    /// Checkout directory name inside the code store.
    pub repo_name: String,

    /// On-disk name of the link itself.
    pub symlink_name: String,
}

impl Display for LinkItem {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&location(&self.workspace, &self.category, &self.symlink_name))
    }
}

/// A symlink found on disk that no manifest entry claims.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct OrphanItem {
    /// Display name of the workspace the link lives in.
    pub workspace: String,

    /// Category path string within the workspace.
    pub category: String,

    /// On-disk name of the orphaned link.
    pub symlink_name: String,
}

impl Display for OrphanItem {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&location(&self.workspace, &self.category, &self.symlink_name))
    }
}

/// A real checkout directory found inside a workspace tree.
///
/// Informational only. These are candidates for adoption through the `add`
/// flow, never auto-resolved by reconciliation or apply.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ForeignDir {
    /// Display name of the workspace the directory lives in.
    pub workspace: String,

    /// Category path string within the workspace.
    pub category: String,

    /// Name of the non-symlink directory.
    pub dir_name: String,
}

impl Display for ForeignDir {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&location(&self.workspace, &self.category, &self.dir_name))
    }
}

fn location(workspace: &str, category: &str, name: &str) -> String {
    if category == ROOT_CATEGORY {
        format!("{workspace}/{name}")
    } else {
        format!("{workspace}/{category}/{name}")
    }
}

/// Reconciliation output describing every mutation needed to make the
/// filesystem agree with the manifest.
///
/// Built fresh on every reconcile call and consumed immediately. Carries no
/// identity across calls, and is never persisted.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct SyncPlan {
    /// Repos present in the code store, declared by no workspace.
    pub repos_to_add: Vec<String>,

    /// Repos declared somewhere, absent from the code store.
    pub repos_missing: Vec<String>,

    /// Declared links absent from disk whose repo exists.
    pub symlinks_to_create: Vec<LinkItem>,

    /// Links on disk pointing at the wrong target.
    pub symlinks_to_update: Vec<LinkItem>,

    /// Links on disk that no declared entry claims.
    pub symlinks_to_remove: Vec<OrphanItem>,

    /// Positions where a non-symlink object blocks a declared link.
    pub symlink_conflicts: Vec<LinkItem>,

    /// Real checkout directories found inside workspace trees.
    pub non_symlink_dirs: Vec<ForeignDir>,
}

impl SyncPlan {
    /// Check if the plan calls for any change or surfaces any difference.
    pub fn has_changes(&self) -> bool {
        !self.repos_to_add.is_empty()
            || !self.repos_missing.is_empty()
            || !self.symlinks_to_create.is_empty()
            || !self.symlinks_to_update.is_empty()
            || !self.symlinks_to_remove.is_empty()
    }

    /// Check if the plan surfaces conflicts or foreign directories.
    pub fn has_warnings(&self) -> bool {
        !self.symlink_conflicts.is_empty() || !self.non_symlink_dirs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("my-repo", RepoEntry::new("my-repo"); "plain name")]
    #[test_case("acme-code:git", RepoEntry::with_alias("acme-code", "git"); "with alias")]
    #[test_case("  padded  ", RepoEntry::new("padded"); "surrounding whitespace")]
    #[test_case("name:", RepoEntry::new("name"); "empty alias collapses")]
    #[test]
    fn parse_repo_entry(data: &str, expect: RepoEntry) -> anyhow::Result<()> {
        use pretty_assertions::assert_eq;
        let result: RepoEntry = data.parse()?;
        assert_eq!(result, expect);
        Ok(())
    }

    #[test]
    fn parse_repo_entry_rejects_empty_name() {
        let result = ":alias".parse::<RepoEntry>();
        assert!(result.is_err());
    }

    #[test]
    fn symlink_name_prefers_alias() {
        let entry = RepoEntry::with_alias("acme-code", "git");
        assert_eq!(entry.symlink_name(), "git");
        assert_eq!(entry.to_string(), "acme-code:git");

        let entry = RepoEntry::new("acme-code");
        assert_eq!(entry.symlink_name(), "acme-code");
        assert_eq!(entry.to_string(), "acme-code");
    }

    #[test]
    fn workspace_collects_repos_across_categories() {
        let mut workspace = Workspace::new("/home/blah/workspace");
        workspace
            .get_or_create_category(ROOT_CATEGORY)
            .entries
            .push(RepoEntry::new("foo"));
        let category = workspace.get_or_create_category("acme/tools");
        category.entries.push(RepoEntry::new("bar"));
        category.entries.push(RepoEntry::with_alias("foo", "foo2"));

        let expect: BTreeSet<String> = ["foo".into(), "bar".into()].into();
        assert_eq!(workspace.all_repos(), expect);
        assert_eq!(
            workspace.find_repo_categories("foo"),
            vec![".".to_string(), "acme/tools".to_string()]
        );
    }

    #[test]
    fn manifest_finds_repo_locations() {
        let mut workspace = Workspace::new("/home/blah/workspace");
        workspace
            .get_or_create_category(ROOT_CATEGORY)
            .entries
            .push(RepoEntry::new("foo"));

        let mut manifest = Manifest::default();
        manifest.workspaces.insert("workspace".into(), workspace);

        assert_eq!(
            manifest.find_repo_locations("foo"),
            vec![("workspace".to_string(), ".".to_string())]
        );
        assert!(manifest.find_repo_locations("missing").is_empty());
    }

    #[test]
    fn sync_plan_change_detection() {
        let mut plan = SyncPlan::default();
        assert!(!plan.has_changes());
        assert!(!plan.has_warnings());

        plan.repos_to_add.push("foo".into());
        assert!(plan.has_changes());

        let mut plan = SyncPlan::default();
        plan.non_symlink_dirs.push(ForeignDir {
            workspace: "workspace".into(),
            category: ".".into(),
            dir_name: "foo".into(),
        });
        assert!(!plan.has_changes());
        assert!(plan.has_warnings());
    }
}
