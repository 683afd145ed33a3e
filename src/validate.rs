// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manifest validation.
//!
//! Detect structural and naming conflicts in a manifest independent of
//! filesystem state, with one exception: the path-existence checks, which
//! only ever produce advisory findings.
//!
//! Validation is a pure reporting pass. Every check runs even when earlier
//! checks fire, nothing here is treated as fatal, and the caller decides
//! whether to abort or proceed per severity. The one hard rule downstream is
//! that [`crate::apply`] refuses to run while any [`Severity::Blocking`]
//! finding is outstanding.

use crate::model::{Manifest, ROOT_CATEGORY};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// How much weight a validation finding carries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth surfacing, legal to apply.
    #[default]
    Advisory,

    /// The declared topology cannot be realized on disk.
    Blocking,
}

/// One validation finding with human-readable context.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Finding {
    /// Severity class of the finding.
    pub severity: Severity,

    /// Message naming the offending workspace, category, or repo.
    pub message: String,
}

impl Finding {
    fn advisory(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Advisory,
            message: message.into(),
        }
    }

    fn blocking(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Blocking,
            message: message.into(),
        }
    }

    /// Check if this finding blocks plan application.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl Display for Finding {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.message)
    }
}

/// Check if any finding in a report blocks plan application.
pub fn has_blocking(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_blocking)
}

/// Validate a manifest, reporting every structural and naming conflict.
///
/// Side-effect-free. Findings come out in a stable order: path existence,
/// repos declared in multiple categories, duplicate link names within one
/// category, then category paths colliding with declared link names.
pub fn validate(manifest: &Manifest) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !manifest.code_path.exists() {
        findings.push(Finding::advisory(format!(
            "code directory does not exist: {}",
            manifest.code_path.display()
        )));
    }

    for workspace in manifest.workspaces.values() {
        if !workspace.path.exists() {
            findings.push(Finding::advisory(format!(
                "workspace directory does not exist: {}",
                workspace.path.display()
            )));
        }
    }

    for (ws_name, workspace) in &manifest.workspaces {
        // Declaring one repo in several categories is legal fan-out, but
        // usually a leftover from reorganizing, so flag it.
        let mut repo_locations: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (cat_path, category) in &workspace.categories {
            for entry in &category.entries {
                repo_locations
                    .entry(&entry.repo_name)
                    .or_default()
                    .push(cat_path);
            }
        }
        for (repo, locations) in repo_locations {
            if locations.len() > 1 {
                findings.push(Finding::advisory(format!(
                    "repo {:?} appears in multiple categories in {:?}: {}",
                    repo,
                    ws_name,
                    locations.join(", ")
                )));
            }
        }
    }

    for (ws_name, workspace) in &manifest.workspaces {
        for (cat_path, category) in &workspace.categories {
            let mut link_names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for entry in &category.entries {
                link_names
                    .entry(entry.symlink_name())
                    .or_default()
                    .push(&entry.repo_name);
            }
            for (symlink_name, repos) in link_names {
                if repos.len() > 1 {
                    findings.push(Finding::advisory(format!(
                        "duplicate symlink name {:?} in \"{}/{}\": repos {}",
                        symlink_name,
                        ws_name,
                        cat_path,
                        repos.join(", ")
                    )));
                }
            }
        }
    }

    for (ws_name, workspace) in &manifest.workspaces {
        for cat_path in workspace.categories.keys() {
            if cat_path == ROOT_CATEGORY {
                continue;
            }

            // Walk the slash-separated prefixes of this category path. If
            // any prefix category already declares a link named like the
            // next segment, realizing this category would need a directory
            // where a symlink sits. Report only the first conflict.
            let parts: Vec<&str> = cat_path.split('/').collect();
            for index in 0..parts.len() {
                let parent_path = if index == 0 {
                    ROOT_CATEGORY.to_string()
                } else {
                    parts[..index].join("/")
                };
                let segment = parts[index];

                let conflicts = workspace
                    .get_category(&parent_path)
                    .is_some_and(|parent| parent.symlink_names().contains(segment));
                if conflicts {
                    findings.push(Finding::blocking(format!(
                        "category path {:?} in workspace {:?} conflicts with \
                         repo {:?} in category {:?}",
                        cat_path, ws_name, segment, parent_path
                    )));
                    break;
                }
            }
        }
    }

    findings
}
