// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! VS Code workspace file export.
//!
//! Generate `.code-workspace` files whose folder entries point at the
//! symlinks of a grove workspace, either all of it or one category. Folder
//! paths are written relative to the output directory so the generated
//! files survive relocation together with the trees they reference.

use crate::{
    model::{Manifest, Workspace, ROOT_CATEGORY},
    path::relative_to,
};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::instrument;

/// One folder entry of a `.code-workspace` file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Folder {
    /// Display name, the symlink name of the repo.
    pub name: String,

    /// Path relative to the workspace file's directory.
    pub path: String,
}

/// Serialized shape of a `.code-workspace` file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct WorkspaceFile {
    /// Folder entries, sorted by name and deduplicated.
    pub folders: Vec<Folder>,

    /// Settings blob; emitted empty, left to the user to fill in.
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Name of the workspace file for target workspace and category filter.
///
/// The whole workspace exports as `<name>.code-workspace`, the root category
/// as `<name>-root.code-workspace`, and any other category as its path slug
/// with slashes replaced by dashes.
pub fn workspace_file_name(ws_name: &str, category_path: Option<&str>) -> String {
    match category_path {
        None => format!("{ws_name}.code-workspace"),
        Some(ROOT_CATEGORY) => format!("{ws_name}-root.code-workspace"),
        Some(category) => format!("{}.code-workspace", category.replace('/', "-")),
    }
}

/// Build the workspace file content for target workspace.
///
/// Folder paths are computed relative to `output_dir`. Entries sharing a
/// symlink name collapse to the first occurrence; the result is sorted by
/// folder name.
///
/// # Errors
///
/// - Return [`VscodeError::UnknownWorkspace`] if the manifest does not
///   declare target workspace.
/// - Return [`VscodeError::UnknownCategory`] if a category filter names no
///   declared category.
pub fn generate_workspace_file(
    manifest: &Manifest,
    ws_name: &str,
    category_path: Option<&str>,
    output_dir: &Path,
) -> Result<WorkspaceFile> {
    let Some(workspace) = manifest.get_workspace(ws_name) else {
        return Err(VscodeError::UnknownWorkspace {
            name: ws_name.into(),
            available: known_keys(manifest.workspaces.keys()),
        });
    };

    if let Some(category) = category_path {
        if workspace.get_category(category).is_none() {
            return Err(VscodeError::UnknownCategory {
                category: category.into(),
                workspace: ws_name.into(),
                available: known_keys(workspace.categories.keys()),
            });
        }
    }

    let prefix = relative_to(&workspace.path, output_dir);

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut folders = Vec::new();
    for (cat_path, category) in selected_categories(workspace, category_path) {
        for entry in &category.entries {
            let name = entry.symlink_name();
            if !seen.insert(name) {
                continue;
            }

            let path = if cat_path == ROOT_CATEGORY {
                prefix.join(name)
            } else {
                prefix.join(cat_path).join(name)
            };
            folders.push(Folder {
                name: name.to_owned(),
                path: path.to_string_lossy().into_owned(),
            });
        }
    }
    folders.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

    Ok(WorkspaceFile {
        folders,
        settings: serde_json::Map::new(),
    })
}

/// Write a workspace file to target directory, creating parents as needed.
///
/// Returns the full path of the written file.
///
/// # Errors
///
/// - Return [`VscodeError::Serialize`] if JSON rendering fails.
/// - Return [`VscodeError::Write`] if the file cannot be written.
#[instrument(skip(file), level = "debug")]
pub fn write_workspace_file(
    file: &WorkspaceFile,
    output_dir: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    let output_path = output_dir.join(file_name);

    mkdirp::mkdirp(output_dir).map_err(|source| VscodeError::Write {
        path: output_path.clone(),
        source,
    })?;

    let mut content = serde_json::to_string_pretty(file).map_err(VscodeError::Serialize)?;
    content.push('\n');

    fs::write(&output_path, content).map_err(|source| VscodeError::Write {
        path: output_path.clone(),
        source,
    })?;

    Ok(output_path)
}

fn selected_categories<'a>(
    workspace: &'a Workspace,
    category_path: Option<&str>,
) -> Vec<(&'a str, &'a crate::model::Category)> {
    workspace
        .categories
        .iter()
        .filter(|(cat_path, _)| category_path.is_none_or(|filter| filter == cat_path.as_str()))
        .map(|(cat_path, category)| (cat_path.as_str(), category))
        .collect()
}

fn known_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    keys.cloned().collect::<Vec<_>>().join(", ")
}

/// Workspace export error types.
#[derive(Debug, thiserror::Error)]
pub enum VscodeError {
    /// Manifest declares no workspace with target name.
    #[error("workspace {name:?} not found; available: {available}")]
    UnknownWorkspace { name: String, available: String },

    /// Workspace declares no category with target path.
    #[error("category {category:?} not found in workspace {workspace:?}; available: {available}")]
    UnknownCategory {
        category: String,
        workspace: String,
        available: String,
    },

    /// Workspace file cannot be rendered as JSON.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Workspace file cannot be written.
    #[error("cannot write workspace file {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = VscodeError> = std::result::Result<T, E>;
