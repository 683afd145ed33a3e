// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use grove::{
    adopt::adopt_workspace_symlinks,
    apply::{apply, ApplyOptions},
    config::{default_manifest, load_manifest, manifest_path, save_manifest},
    model::{Manifest, RepoEntry, SyncPlan, ROOT_CATEGORY},
    reconcile::reconcile,
    remote::suggest_category,
    scan::{scan_code_store, scan_workspace_non_symlinks},
    validate::{has_blocking, validate},
    vscode::{generate_workspace_file, workspace_file_name, write_workspace_file},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Select, Text};
use std::{fmt::Display, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  grove [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to manifest file.
    #[arg(short, long, value_name = "path", global = true)]
    config: Option<PathBuf>,

    /// Preview changes without making them.
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Never prompt; use defaults.
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let path = manifest_path(self.config.clone())?;
        match &self.command {
            Command::Init(opts) => run_init(&self, &path, opts.clone()),
            Command::Status => run_status(&path),
            Command::Apply(opts) => run_apply(&self, &path, opts.clone()),
            Command::Sync(opts) => run_sync(&self, &path, opts.clone()),
            Command::Add(opts) => run_add(&self, &path, opts.clone()),
            Command::Adopt(opts) => run_adopt(&self, &path, opts.clone()),
            Command::Vscode(opts) => run_vscode(&path, opts.clone()),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create a fresh manifest.
    #[command(override_usage = "grove init [options]")]
    Init(InitOptions),

    /// Show how declared state differs from disk state.
    #[command(override_usage = "grove status")]
    Status,

    /// Create and repair symlinks to match the manifest.
    #[command(override_usage = "grove apply [options]")]
    Apply(ApplyCmdOptions),

    /// Declare code store repos the manifest does not mention yet.
    #[command(override_usage = "grove sync [options]")]
    Sync(SyncOptions),

    /// Declare a single repo under a chosen category.
    #[command(override_usage = "grove add [options] <repo_name>")]
    Add(AddOptions),

    /// Take ownership of symlinks already present in a workspace.
    #[command(override_usage = "grove adopt [options]")]
    Adopt(AdoptOptions),

    /// Export VS Code workspace files.
    #[command(override_usage = "grove vscode [options] <workspace>")]
    Vscode(VscodeOptions),
}

#[derive(Parser, Clone, Debug)]
struct InitOptions {
    /// Path to code store (default: ~/code).
    #[arg(long, value_name = "path")]
    code: Option<PathBuf>,

    /// Workspace directory, repeatable (default: ~/workspace).
    #[arg(short, long = "workspace", value_name = "path")]
    workspaces: Vec<PathBuf>,

    /// Scan existing repos and prompt for categorization.
    #[arg(long)]
    scan: bool,
}

#[derive(Parser, Clone, Debug)]
struct ApplyCmdOptions {
    /// Remove orphaned symlinks too.
    #[arg(long)]
    prune: bool,

    /// Only apply to target workspace.
    #[arg(short, long, value_name = "name")]
    workspace: Option<String>,
}

#[derive(Parser, Clone, Debug)]
struct SyncOptions {
    /// Workspace that receives repos when not prompting.
    #[arg(short, long, value_name = "name")]
    workspace: Option<String>,
}

#[derive(Parser, Clone, Debug)]
struct AddOptions {
    #[arg(value_name = "repo_name")]
    repo_name: String,
}

#[derive(Parser, Clone, Debug)]
struct AdoptOptions {
    /// Only adopt from target workspace.
    #[arg(short, long, value_name = "name")]
    workspace: Option<String>,
}

#[derive(Parser, Clone, Debug)]
struct VscodeOptions {
    #[arg(value_name = "workspace")]
    workspace: String,

    /// Only export target category.
    #[arg(long, value_name = "path")]
    category: Option<String>,

    /// Output directory (default: manifest's vscode_workspaces path).
    #[arg(short, long, value_name = "path")]
    output: Option<PathBuf>,
}

fn main() {
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_init(cli: &Cli, path: &PathBuf, opts: InitOptions) -> Result<()> {
    if path.exists() && !cli.non_interactive {
        let overwrite = Confirm::new(&format!("Manifest already exists at {}. Overwrite?", path.display()))
            .with_default(false)
            .prompt()?;
        if !overwrite {
            println!("aborted");
            return Ok(());
        }
    }

    let mut manifest = default_manifest(opts.code, opts.workspaces)?;

    if !manifest.code_path.exists() {
        if cli.dry_run {
            println!("would create: {}", manifest.code_path.display());
        } else {
            mkdirp::mkdirp(&manifest.code_path)
                .with_context(|| format!("cannot create {}", manifest.code_path.display()))?;
            println!("created: {}", manifest.code_path.display());
        }
    }

    if opts.scan {
        let repos = scan_code_store(&manifest.code_path)?;
        if !repos.is_empty() {
            println!(
                "found {} repositories in {}",
                repos.len(),
                manifest.code_path.display()
            );
            for repo in repos {
                declare_repo(cli, &mut manifest, &repo, None, None)?;
            }
        }
    }

    if cli.dry_run {
        println!("would save manifest to: {}", path.display());
    } else {
        save_manifest(&manifest, path)?;
        println!("manifest saved to: {}", path.display());
    }

    for finding in validate(&manifest) {
        println!("warning: {finding}");
    }

    Ok(())
}

fn run_status(path: &PathBuf) -> Result<()> {
    let manifest = load_manifest(path)?;

    let findings = validate(&manifest);
    for finding in &findings {
        println!("warning: {finding}");
    }

    let plan = reconcile(&manifest)?;
    print_plan(&plan);

    if !plan.has_changes() && !plan.has_warnings() {
        println!("everything is in sync");
    } else if !plan.symlinks_to_remove.is_empty() {
        println!("\nrun 'grove apply --prune' to sync symlinks");
    } else if plan.has_changes() {
        println!("\nrun 'grove apply' to sync symlinks");
    }

    Ok(())
}

fn run_apply(cli: &Cli, path: &PathBuf, opts: ApplyCmdOptions) -> Result<()> {
    let manifest = load_manifest(path)?;

    let findings = validate(&manifest);
    for finding in &findings {
        println!("warning: {finding}");
    }
    if has_blocking(&findings) {
        bail!("manifest has blocking conflicts; fix it before applying");
    }

    let mut plan = reconcile(&manifest)?;
    if let Some(name) = &opts.workspace {
        retain_workspace(&mut plan, name);
    }

    if !plan.symlink_conflicts.is_empty() {
        for item in &plan.symlink_conflicts {
            println!("  ! {item}");
        }
        bail!("real files occupy declared symlink positions; resolve the conflicts above first");
    }

    if !plan.has_changes() {
        println!("nothing to do, everything is in sync");
        return Ok(());
    }

    print_items("creating symlinks:", "+", &plan.symlinks_to_create);
    print_items("updating symlinks:", "~", &plan.symlinks_to_update);
    if opts.prune {
        print_items("removing orphaned symlinks:", "-", &plan.symlinks_to_remove);
    }

    let report = apply(
        &manifest,
        &plan,
        ApplyOptions {
            dry_run: cli.dry_run,
            remove_orphans: opts.prune,
        },
    )?;

    if cli.dry_run {
        println!("\ndry run, no changes made");
    }
    println!(
        "created {}, updated {}, removed {}, pruned {} empty dir(s)",
        report.created.len(),
        report.updated.len(),
        report.removed.len(),
        report.pruned.len()
    );
    if report.has_errors() {
        for error in &report.errors {
            println!("error: {error}");
        }
        bail!("{} item(s) failed; re-run after investigating", report.errors.len());
    }

    Ok(())
}

fn run_sync(cli: &Cli, path: &PathBuf, opts: SyncOptions) -> Result<()> {
    let mut manifest = load_manifest(path)?;

    let code_repos = scan_code_store(&manifest.code_path)?;
    let declared = manifest.all_repos();
    let uncategorized: Vec<String> = code_repos.difference(&declared).cloned().collect();

    if uncategorized.is_empty() {
        println!("all repos are categorized");
        return Ok(());
    }

    println!("found {} uncategorized repos", uncategorized.len());
    let mut added = 0;
    for repo in &uncategorized {
        if declare_repo(cli, &mut manifest, repo, opts.workspace.as_deref(), None)? {
            added += 1;
        }
    }

    if added > 0 {
        if cli.dry_run {
            println!("would add {added} repos to manifest");
        } else {
            save_manifest(&manifest, path)?;
            println!("added {added} repos to manifest");
            println!("run 'grove apply' to create symlinks");
        }
    }

    Ok(())
}

fn run_add(cli: &Cli, path: &PathBuf, opts: AddOptions) -> Result<()> {
    let mut manifest = load_manifest(path)?;
    let repo_name = &opts.repo_name;

    let mut suggested_ws: Option<String> = None;
    let mut suggested_cat: Option<String> = None;

    let repo_path = manifest.code_path.join(repo_name);
    if !repo_path.exists() {
        // A direct clone sitting inside a workspace can be moved home.
        let Some((found_path, ws_name, cat_path)) = find_repo_in_workspaces(&manifest, repo_name)?
        else {
            bail!("repo not found: {}", repo_path.display());
        };

        suggested_ws = Some(ws_name);
        suggested_cat = Some(cat_path);
        println!("found '{repo_name}' in workspace: {}", found_path.display());
        println!("it should be moved to: {}", repo_path.display());

        let approve = cli.non_interactive
            || Confirm::new("Move to code directory?").with_default(true).prompt()?;
        if !approve {
            println!("aborted");
            return Ok(());
        }

        if cli.dry_run {
            println!("would move {} -> {}", found_path.display(), repo_path.display());
        } else {
            std::fs::rename(&found_path, &repo_path).with_context(|| {
                format!("cannot move {} to {}", found_path.display(), repo_path.display())
            })?;
            println!("moved to {}", repo_path.display());
        }
    }

    if !cli.dry_run && !repo_path.join(".git").exists() {
        bail!("not a git repo: {}", repo_path.display());
    }

    let locations = manifest.find_repo_locations(repo_name);
    if !locations.is_empty() {
        println!("repo '{repo_name}' already declared in:");
        for (ws_name, cat_path) in &locations {
            println!("  - {ws_name}/{cat_path}");
        }
        let again = !cli.non_interactive
            && Confirm::new("Add to another location?").with_default(false).prompt()?;
        if !again {
            return Ok(());
        }
    }

    if suggested_cat.is_none() {
        suggested_cat = suggest_category(&repo_path);
    }

    declare_repo(
        cli,
        &mut manifest,
        repo_name,
        suggested_ws.as_deref(),
        suggested_cat.as_deref(),
    )?;

    if cli.dry_run {
        println!("dry run, manifest not saved");
    } else {
        save_manifest(&manifest, path)?;
        println!("manifest updated; run 'grove apply' to create symlinks");
    }

    Ok(())
}

fn run_adopt(cli: &Cli, path: &PathBuf, opts: AdoptOptions) -> Result<()> {
    let mut manifest = load_manifest(path)?;
    let code_path = manifest.code_path.clone();

    let names: Vec<String> = match &opts.workspace {
        Some(name) => vec![name.clone()],
        None => manifest.workspaces.keys().cloned().collect(),
    };

    let mut adopted = 0;
    for ws_name in names {
        let workspace = manifest
            .get_workspace(&ws_name)
            .ok_or_else(|| anyhow!("unknown workspace: {ws_name}"))?
            .clone();
        let scan = adopt_workspace_symlinks(&workspace, &code_path)?;

        for warning in &scan.warnings {
            println!("warning: {warning}");
        }

        let workspace = manifest
            .workspaces
            .get_mut(&ws_name)
            .ok_or_else(|| anyhow!("unknown workspace: {ws_name}"))?;
        for adoption in scan.adoptions {
            let category = workspace.get_or_create_category(&adoption.category);
            if category.entries.contains(&adoption.entry) {
                continue;
            }
            if adoption.category == ROOT_CATEGORY {
                println!("  + {ws_name}/{}", adoption.entry);
            } else {
                println!("  + {ws_name}/{}/{}", adoption.category, adoption.entry);
            }
            category.entries.push(adoption.entry);
            adopted += 1;
        }
    }

    if adopted == 0 {
        println!("nothing to adopt");
    } else if cli.dry_run {
        println!("would adopt {adopted} symlink(s) into the manifest");
    } else {
        save_manifest(&manifest, path)?;
        println!("adopted {adopted} symlink(s) into the manifest");
    }

    Ok(())
}

fn run_vscode(path: &PathBuf, opts: VscodeOptions) -> Result<()> {
    let manifest = load_manifest(path)?;

    let output_dir = opts
        .output
        .or_else(|| manifest.vscode_export_path.clone())
        .ok_or_else(|| {
            anyhow!("no output directory; pass --output or set 'vscode_workspaces' in the manifest")
        })?;

    let file = generate_workspace_file(
        &manifest,
        &opts.workspace,
        opts.category.as_deref(),
        &output_dir,
    )?;
    let file_name = workspace_file_name(&opts.workspace, opts.category.as_deref());
    let written = write_workspace_file(&file, &output_dir, &file_name)?;

    println!("wrote {} ({} folders)", written.display(), file.folders.len());
    Ok(())
}

/// Declare a repo into some workspace/category, prompting unless told not to.
///
/// Returns whether the repo was declared or skipped.
fn declare_repo(
    cli: &Cli,
    manifest: &mut Manifest,
    repo_name: &str,
    suggested_ws: Option<&str>,
    suggested_cat: Option<&str>,
) -> Result<bool> {
    let ws_names: Vec<String> = manifest.workspaces.keys().cloned().collect();
    if ws_names.is_empty() {
        bail!("no workspaces declared in manifest");
    }

    let (ws_name, cat_path) = if cli.non_interactive {
        let ws_name = suggested_ws
            .map(ToOwned::to_owned)
            .filter(|name| manifest.workspaces.contains_key(name))
            .unwrap_or_else(|| ws_names[0].clone());
        let cat_path = suggested_cat.unwrap_or(ROOT_CATEGORY).to_owned();
        (ws_name, cat_path)
    } else {
        println!("\n{repo_name}");

        let ws_name = if ws_names.len() == 1 {
            ws_names[0].clone()
        } else {
            let mut options = ws_names.clone();
            options.push("(skip)".into());
            let choice = Select::new("Select workspace", options).prompt()?;
            if choice == "(skip)" {
                return Ok(false);
            }
            choice
        };

        let workspace = manifest
            .get_workspace(&ws_name)
            .ok_or_else(|| anyhow!("unknown workspace: {ws_name}"))?;
        let mut options: Vec<String> = workspace.categories.keys().cloned().collect();
        options.push("(new category)".into());
        options.push("(skip)".into());
        let choice = Select::new("Select category", options).prompt()?;

        let cat_path = match choice.as_str() {
            "(skip)" => return Ok(false),
            "(new category)" => Text::new("Category path (e.g. 'acme/tools' or '.')")
                .with_default(suggested_cat.unwrap_or(ROOT_CATEGORY))
                .prompt()?,
            existing => existing.to_owned(),
        };

        (ws_name, cat_path)
    };

    let workspace = manifest
        .workspaces
        .get_mut(&ws_name)
        .ok_or_else(|| anyhow!("unknown workspace: {ws_name}"))?;
    let category = workspace.get_or_create_category(&cat_path);
    if category.repo_names().contains(repo_name) {
        println!("  already in {ws_name}/{cat_path}");
        return Ok(false);
    }

    category.entries.push(RepoEntry::new(repo_name));
    println!("  + added to {ws_name}/{cat_path}");
    Ok(true)
}

/// Find a direct (non-symlink) clone of target repo inside any workspace.
fn find_repo_in_workspaces(
    manifest: &Manifest,
    repo_name: &str,
) -> Result<Option<(PathBuf, String, String)>> {
    for (ws_name, workspace) in &manifest.workspaces {
        let foreign = scan_workspace_non_symlinks(&workspace.path)?;
        for (cat_path, dir_names) in &foreign {
            if dir_names.contains(repo_name) {
                let found = if cat_path == ROOT_CATEGORY {
                    workspace.path.join(repo_name)
                } else {
                    workspace.path.join(cat_path).join(repo_name)
                };
                return Ok(Some((found, ws_name.clone(), cat_path.clone())));
            }
        }
    }

    Ok(None)
}

fn retain_workspace(plan: &mut SyncPlan, name: &str) {
    plan.symlinks_to_create.retain(|item| item.workspace == name);
    plan.symlinks_to_update.retain(|item| item.workspace == name);
    plan.symlinks_to_remove.retain(|item| item.workspace == name);
    plan.symlink_conflicts.retain(|item| item.workspace == name);
}

fn print_plan(plan: &SyncPlan) {
    if !plan.repos_to_add.is_empty() {
        println!("\nuncategorized repos in code directory:");
        for repo in &plan.repos_to_add {
            println!("  ? {repo}");
        }
    }

    if !plan.repos_missing.is_empty() {
        println!("\nmissing repos (declared but not in code directory):");
        for repo in &plan.repos_missing {
            println!("  ! {repo}");
        }
    }

    print_items("symlinks to create:", "+", &plan.symlinks_to_create);
    print_items("symlinks to update:", "~", &plan.symlinks_to_update);
    print_items("orphaned symlinks (not declared):", "-", &plan.symlinks_to_remove);
    print_items(
        "conflicts (real files where symlinks should be):",
        "!",
        &plan.symlink_conflicts,
    );
    print_items(
        "non-symlink directories in workspaces:",
        "?",
        &plan.non_symlink_dirs,
    );
}

fn print_items<T: Display>(title: &str, marker: &str, items: &[T]) {
    if items.is_empty() {
        return;
    }

    println!("\n{title}");
    for item in items {
        println!("  {marker} {item}");
    }
}
