// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Organize flat git clone stores into symlinked workspace trees.
//!
//! Grove keeps every checkout in one flat directory (the __code store__) and
//! presents them through one or more curated directory trees (__workspaces__)
//! as symlinks grouped under nested category paths. A TOML manifest declares
//! which repository appears where, optionally under an alias name; grove
//! reconciles that declaration against on-disk reality.
//!
//! # Reconciliation Pipeline
//!
//! 1. [`config`] loads the manifest into the [`model`] types.
//! 2. [`validate`] reports structural and naming conflicts in the manifest
//!    alone, tagged advisory or blocking.
//! 3. [`scan`] answers read-only queries about the code store and each
//!    workspace tree.
//! 4. [`reconcile`] diffs declared state against scanned state into a
//!    [`model::SyncPlan`].
//! 5. [`apply`] executes the plan with per-item failure isolation, then
//!    prunes empty category directories.
//!
//! The pipeline is single-threaded and synchronous, re-scans from scratch on
//! every call, and takes no locks: convergence comes from idempotent
//! re-invocation, not transactional atomicity. Grove assumes no other
//! process mutates the code store or workspace trees during a
//! reconcile-and-apply cycle.

pub mod adopt;
pub mod apply;
pub mod config;
pub mod model;
pub mod path;
pub mod reconcile;
pub mod remote;
pub mod scan;
pub mod validate;
pub mod vscode;

#[doc(inline)]
pub use crate::{
    apply::{apply, ApplyOptions, ApplyReport},
    config::{load_manifest, save_manifest},
    model::{Manifest, RepoEntry, SyncPlan, Workspace},
    reconcile::reconcile,
    validate::validate,
};
