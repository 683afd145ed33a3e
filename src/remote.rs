// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository remote inspection.
//!
//! Read a checkout's configured remotes and pick apart remote URLs into
//! host, organization path, and repository name. The organization path makes
//! a decent default category when declaring a freshly discovered repo, which
//! is exactly what the `add` flow uses it for.
//!
//! All failure here is soft: a directory that is not a repository, or a URL
//! in a shape we do not recognize, simply yields nothing.

use regex::Regex;
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

/// Host, organization path, and repository name picked out of a remote URL.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct RemoteParts {
    /// Hosting domain, e.g. `github.com`.
    pub host: String,

    /// Organization path, possibly nested, e.g. `scm/team`.
    pub org: String,

    /// Repository name with any `.git` suffix removed.
    pub repo: String,
}

/// Parse a git remote URL into its parts.
///
/// Recognized shapes, in match order:
///
/// - `git@github.com:org/repo.git` (SSH with colon separator)
/// - `jdoe@stash.acme.com/scm/team/repo.git` (SSH with slash separator)
/// - `ssh://user@bitbucket.org/team/repo.git`
/// - `https://github.com/org/sub/repo.git`
///
/// Unrecognized shapes yield `None`.
pub fn parse_remote_url(url: &str) -> Option<RemoteParts> {
    let url = url.trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);
    if url.is_empty() {
        return None;
    }

    let patterns = [
        r"^[^@]+@([^:]+):(.+)/([^/]+)$",
        r"^[^@]+@([^/]+)/(.+)/([^/]+)$",
        r"^ssh://(?:[^@]+@)?([^/]+)/(.+)/([^/]+)$",
        r"^https?://([^/]+)/(.+)/([^/]+)$",
    ];

    for pattern in patterns {
        let regex = Regex::new(pattern).ok()?;
        if let Some(captures) = regex.captures(url) {
            return Some(RemoteParts {
                host: captures[1].into(),
                org: captures[2].into(),
                repo: captures[3].into(),
            });
        }
    }

    None
}

/// List all configured remotes of target checkout.
///
/// Maps remote names to their fetch URLs. A path that is not a repository,
/// or a repository whose remotes cannot be read, yields an empty map.
pub fn repo_remotes(repo_path: &Path) -> BTreeMap<String, String> {
    let mut remotes = BTreeMap::new();

    let repo = match git2::Repository::open(repo_path) {
        Ok(repo) => repo,
        Err(error) => {
            debug!("cannot open {:?}: {error}", repo_path.display());
            return remotes;
        }
    };

    let names = match repo.remotes() {
        Ok(names) => names,
        Err(error) => {
            debug!("cannot list remotes of {:?}: {error}", repo_path.display());
            return remotes;
        }
    };

    for name in names.iter().flatten() {
        if let Ok(remote) = repo.find_remote(name) {
            if let Some(url) = remote.url() {
                remotes.insert(name.to_owned(), url.to_owned());
            }
        }
    }

    remotes
}

/// Suggest a category path for target checkout from its remotes.
///
/// Prefers `origin`, falling back to the first remote in name order. The
/// suggestion is the organization path of the parsed URL.
pub fn suggest_category(repo_path: &Path) -> Option<String> {
    let remotes = repo_remotes(repo_path);
    let url = remotes
        .get("origin")
        .or_else(|| remotes.values().next())?;
    parse_remote_url(url).map(|parts| parts.org)
}
