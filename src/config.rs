// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted manifest layout.
//!
//! Specify the layout of the manifest file that grove uses to declare which
//! repositories appear where, and convert between that layout and the
//! in-memory [`Manifest`] model.
//!
//! # General Layout
//!
//! The manifest is a TOML document. The reserved top-level key `code` holds
//! the code store path, supporting a leading `~` for home-directory
//! expansion. The reserved key `vscode_workspaces` optionally names a
//! default directory for the VS Code export. Every other top-level key names
//! a workspace: bare names like `Projects` resolve to `~/Projects`, while
//! keys starting with `~` or `/` are used as paths directly. A workspace
//! value maps category-path strings to arrays of repo-entry strings in the
//! form `repo_name` or `repo_name:alias`:
//!
//! ```toml
//! code = "~/code"
//!
//! [Projects]
//! "." = ["my-repo"]
//! "acme/tools" = ["acme-code:git"]
//! ```
//!
//! Serialization is canonical: workspaces, categories, and entries are all
//! emitted in sorted order, and paths under the home directory contract back
//! to `~` for readability.

use crate::{
    model::{Category, Manifest, Workspace},
    path::{contract_home, default_manifest_path, home_dir},
};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Raw document shape of the manifest file.
///
/// Workspace tables are captured through flattening, which is what makes
/// "any unreserved top-level key is a workspace" work with serde.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
struct ManifestLayout {
    /// Path to the flat store of git checkouts.
    code: Option<String>,

    /// Default output directory for the VS Code export.
    #[serde(skip_serializing_if = "Option::is_none")]
    vscode_workspaces: Option<String>,

    /// Workspace tables: category path string to repo entry strings.
    #[serde(flatten)]
    workspaces: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl FromStr for Manifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let layout: ManifestLayout = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // The pre-1.0 layout kept workspaces under one reserved table. Give
        // a pointed error instead of treating it as a workspace named
        // "workspaces".
        if layout.workspaces.contains_key("workspaces") {
            return Err(ConfigError::LegacyLayout);
        }

        let code_path = expand_path(layout.code.as_deref().unwrap_or("~/code"))?;
        let vscode_export_path = layout
            .vscode_workspaces
            .as_deref()
            .map(expand_path)
            .transpose()?;

        // INVARIANT: Workspace display names (path basenames) stay unique.
        //   Two keys mapping to the same basename would silently shadow one
        //   another everywhere the name is used as a qualifier.
        let mut basenames: BTreeMap<String, String> = BTreeMap::new();
        let mut workspaces: BTreeMap<String, Workspace> = BTreeMap::new();
        for (key, categories) in &layout.workspaces {
            let ws_path = key_to_workspace_path(key)?;
            let workspace = Workspace::new(ws_path);
            let ws_name = workspace.name();

            if let Some(existing) = basenames.get(&ws_name) {
                return Err(ConfigError::WorkspaceCollision {
                    name: ws_name,
                    first: existing.clone(),
                    second: key.clone(),
                });
            }
            basenames.insert(ws_name.clone(), key.clone());

            let mut workspace = workspace;
            for (cat_path, repo_strs) in categories {
                let mut category = Category::new(cat_path.clone());
                for repo_str in repo_strs {
                    let entry =
                        repo_str
                            .parse()
                            .map_err(|source| ConfigError::Entry {
                                workspace: key.clone(),
                                category: cat_path.clone(),
                                source,
                            })?;
                    category.entries.push(entry);
                }
                workspace.categories.insert(cat_path.clone(), category);
            }

            workspaces.insert(ws_name, workspace);
        }

        Ok(Manifest {
            code_path,
            workspaces,
            vscode_export_path,
        })
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(render(self)?.as_str())
    }
}

/// Render manifest into its canonical persisted form.
fn render(manifest: &Manifest) -> Result<String> {
    let mut layout = ManifestLayout {
        code: Some(contract_home(&manifest.code_path)),
        vscode_workspaces: manifest.vscode_export_path.as_deref().map(contract_home),
        workspaces: BTreeMap::new(),
    };

    for workspace in manifest.workspaces.values() {
        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (cat_path, category) in &workspace.categories {
            let mut entries: Vec<String> = category
                .entries
                .iter()
                .map(ToString::to_string)
                .collect();
            entries.sort();
            categories.insert(cat_path.clone(), entries);
        }
        layout
            .workspaces
            .insert(workspace_key(&workspace.path), categories);
    }

    toml::ser::to_string_pretty(&layout).map_err(ConfigError::Serialize)
}

/// Load manifest from target file.
///
/// # Errors
///
/// - Return [`ConfigError::NotFound`] if target file does not exist.
/// - Return [`ConfigError::Read`] if target file cannot be read.
/// - Return [`ConfigError::Deserialize`] if the document is malformed.
#[instrument(level = "debug")]
pub fn load_manifest(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Manifest> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loaded manifest from {:?}", path.display());

    data.parse()
}

/// Save manifest to target file in canonical form.
///
/// Creates parent directories as needed.
///
/// # Errors
///
/// - Return [`ConfigError::Write`] if target file cannot be written.
/// - Return [`ConfigError::Serialize`] if the manifest cannot be rendered.
#[instrument(skip(manifest), level = "debug")]
pub fn save_manifest(manifest: &Manifest, path: impl AsRef<Path> + std::fmt::Debug) -> Result<()> {
    let path = path.as_ref();
    let rendered = render(manifest)?;

    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, rendered).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("saved manifest to {:?}", path.display());

    Ok(())
}

/// Build a fresh manifest with sensible defaults.
///
/// The code store defaults to `~/code`, and the workspace set defaults to a
/// single `~/workspace` tree.
///
/// # Errors
///
/// - Return [`ConfigError::NoWayHome`] if the home directory is unknown.
pub fn default_manifest(
    code_path: Option<PathBuf>,
    workspace_paths: Vec<PathBuf>,
) -> Result<Manifest> {
    let home = home_dir()?;
    let code_path = code_path.unwrap_or_else(|| home.join("code"));

    let workspace_paths = if workspace_paths.is_empty() {
        vec![home.join("workspace")]
    } else {
        workspace_paths
    };

    let mut workspaces = BTreeMap::new();
    for ws_path in workspace_paths {
        let workspace = Workspace::new(ws_path);
        workspaces.insert(workspace.name(), workspace);
    }

    Ok(Manifest {
        code_path,
        workspaces,
        vscode_export_path: None,
    })
}

/// Determine path of the manifest file to operate on.
///
/// Honors an explicit override first, falling back to the XDG default.
///
/// # Errors
///
/// - Return [`ConfigError::NoWayHome`] if the home directory is unknown.
pub fn manifest_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(default_manifest_path()?),
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(raw)
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

fn key_to_workspace_path(key: &str) -> Result<PathBuf> {
    if key.starts_with('~') || key.starts_with('/') {
        expand_path(key)
    } else {
        Ok(home_dir()?.join(key))
    }
}

fn workspace_key(path: &Path) -> String {
    if let Ok(home) = home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            // Directly under home renders as a bare name.
            if relative.components().count() == 1 {
                return relative.display().to_string();
            }
        }
    }

    contract_home(path)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Manifest file does not exist.
    #[error("manifest file not found: {0}")]
    NotFound(PathBuf),

    /// Manifest file cannot be read.
    #[error("cannot read manifest file {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Manifest file cannot be written.
    #[error("cannot write manifest file {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize manifest document.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize manifest document.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on a configured path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Document still uses the retired `workspaces` table.
    #[error(
        "the 'workspaces' table is no longer supported; \
         declare each workspace as its own top-level key, e.g.\n  \
         code = \"~/code\"\n  [Projects]\n  \".\" = [\"repo1\", \"repo2\"]"
    )]
    LegacyLayout,

    /// Two workspace keys resolve to the same display name.
    #[error("workspace basename collision: {name:?} declared by both {first:?} and {second:?}")]
    WorkspaceCollision {
        name: String,
        first: String,
        second: String,
    },

    /// A repo entry string failed to parse.
    #[error("invalid entry in {workspace:?} category {category:?}")]
    Entry {
        workspace: String,
        category: String,
        source: crate::model::ParseEntryError,
    },

    /// Home directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] crate::path::NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepoEntry;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn deserialize_manifest() -> anyhow::Result<()> {
        let result: Manifest = indoc! {r#"
            code = "~/code"
            vscode_workspaces = "~/vscode"

            [Projects]
            "." = ["my-repo", "acme-code:git"]
            "acme/tools" = ["other-repo"]

            ["~/work/forge"]
            "." = ["work-repo"]
        "#}
        .parse()?;

        assert_eq!(result.code_path, PathBuf::from("/home/blah/code"));
        assert_eq!(
            result.vscode_export_path,
            Some(PathBuf::from("/home/blah/vscode"))
        );

        let projects = &result.workspaces["Projects"];
        assert_eq!(projects.path, PathBuf::from("/home/blah/Projects"));
        assert_eq!(
            projects.categories["."].entries,
            vec![
                RepoEntry::new("my-repo"),
                RepoEntry::with_alias("acme-code", "git"),
            ]
        );
        assert_eq!(
            projects.categories["acme/tools"].entries,
            vec![RepoEntry::new("other-repo")]
        );

        let forge = &result.workspaces["forge"];
        assert_eq!(forge.path, PathBuf::from("/home/blah/work/forge"));

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn serialize_manifest_round_trips_canonically() -> anyhow::Result<()> {
        let original: Manifest = indoc! {r#"
            ["~/work/forge"]
            "." = ["zeta", "alpha:a"]

            [Projects]
            "acme/tools" = ["other-repo"]
            "." = ["my-repo"]

            code = "~/code"
        "#}
        .parse()?;

        let rendered = original.to_string();
        let reparsed: Manifest = rendered.parse()?;
        assert_eq!(reparsed, original);

        // Canonical ordering: entries sorted within each category.
        let zeta = rendered.find("\"zeta\"");
        let alpha = rendered.find("\"alpha:a\"");
        assert!(alpha < zeta, "entries not sorted in {rendered}");

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn reject_workspace_basename_collision() {
        let result = indoc! {r#"
            code = "~/code"

            [forge]
            "." = ["my-repo"]

            ["~/work/forge"]
            "." = ["other-repo"]
        "#}
        .parse::<Manifest>();

        assert!(matches!(
            result,
            Err(ConfigError::WorkspaceCollision { name, .. }) if name == "forge"
        ));
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn reject_legacy_workspaces_table() {
        let result = indoc! {r#"
            code = "~/code"

            [workspaces]
            "." = ["my-repo"]
        "#}
        .parse::<Manifest>();

        assert!(matches!(result, Err(ConfigError::LegacyLayout)));
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn default_manifest_uses_home_defaults() -> anyhow::Result<()> {
        let manifest = default_manifest(None, Vec::new())?;
        assert_eq!(manifest.code_path, PathBuf::from("/home/blah/code"));
        assert_eq!(
            manifest.workspaces["workspace"].path,
            PathBuf::from("/home/blah/workspace")
        );
        Ok(())
    }

    #[sealed_test]
    fn save_and_load_manifest() -> anyhow::Result<()> {
        let manifest: Manifest = indoc! {r#"
            code = "/tmp/code"

            ["/tmp/workspace"]
            "." = ["my-repo"]
        "#}
        .parse()?;

        let path = std::env::current_dir()?.join("nested").join("config.toml");
        save_manifest(&manifest, &path)?;
        let result = load_manifest(&path)?;
        assert_eq!(result, manifest);

        Ok(())
    }

    #[sealed_test]
    fn load_manifest_missing_file() {
        let result = load_manifest("does-not-exist.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
