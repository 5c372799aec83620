//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which removes downloaded
//! packages and chroot workspaces.
//!
//! ## Subcommands
//!
//! - **`clean`**: Remove package caches (`--packages`, the default), chroot
//!   workspaces (`--workspace`), or both (`--all`), optionally for a single
//!   provider (`--provider-id`).

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use os_image_composer::cache::{CleanOptions, CleanResult, Cleaner};
use os_image_composer::config::ConfigOverrides;
use os_image_composer::output::{format_size, Output};
use os_image_composer::suggestions;

use crate::cli::GlobalArgs;

/// Manage the package cache and chroot workspaces
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Package cache directory; overrides the config file
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Chroot workspace directory; overrides the config file
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// Remove cached packages and workspaces
    Clean(CleanArgs),
}

/// Arguments for the cache clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Remove downloaded packages (the default when no scope is given)
    #[arg(long)]
    pub packages: bool,

    /// Remove chroot workspaces
    #[arg(long)]
    pub workspace: bool,

    /// Remove both packages and workspaces
    #[arg(long, conflicts_with_all = ["packages", "workspace"])]
    pub all: bool,

    /// Only clean entries of this provider (<os>-<dist>-<arch>)
    #[arg(long, value_name = "ID")]
    pub provider_id: Option<String>,

    /// Show what would be deleted without actually deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

impl CleanArgs {
    fn options(&self) -> CleanOptions {
        let (packages, workspace) = if self.all {
            (true, true)
        } else if !self.packages && !self.workspace {
            (true, false)
        } else {
            (self.packages, self.workspace)
        };
        CleanOptions {
            packages,
            workspace,
            provider_id: self.provider_id.clone(),
            dry_run: self.dry_run,
        }
    }
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs, globals: &GlobalArgs) -> Result<()> {
    let config = globals.load_config(ConfigOverrides {
        cache_dir: args.cache_dir,
        work_dir: args.work_dir,
        ..Default::default()
    })?;

    match args.command {
        CacheSubcommand::Clean(clean_args) => {
            let cleaner = Cleaner::new(&config.cache_dir, &config.work_dir);
            execute_clean(&cleaner, &clean_args, &globals.out)
        }
    }
}

/// Execute the `cache clean` command.
fn execute_clean(cleaner: &Cleaner, args: &CleanArgs, out: &Output) -> Result<()> {
    let options = args.options();

    if options.dry_run {
        out.status("🔎", "[DRY RUN]", "Dry run: no files were deleted.");
    }

    // sizes must be measured before the paths are gone
    let freed = if options.dry_run {
        None
    } else {
        let preview = cleaner
            .clean(&CleanOptions {
                dry_run: true,
                ..options.clone()
            })
            .map_err(suggestions::explain)?;
        Some(total_size(&preview.removed_paths))
    };

    let result = cleaner.clean(&options).map_err(suggestions::explain)?;
    report(&result, &options, out);

    if !result.removed_paths.is_empty() {
        let bytes = freed.unwrap_or_else(|| total_size(&result.removed_paths));
        let verb = if options.dry_run { "Would free" } else { "Freed" };
        out.line(&format!("{} {}", verb, format_size(bytes)));
    }
    Ok(())
}

fn report(result: &CleanResult, options: &CleanOptions, out: &Output) {
    if result.removed_paths.is_empty() {
        out.line(&format!("No {} entries found.", scope_name(options)));
    } else {
        out.heading(if options.dry_run {
            "Would remove:"
        } else {
            "Removed paths:"
        });
        for path in &result.removed_paths {
            out.line(&format!("  {}", path.display()));
        }
    }

    if !result.skipped_paths.is_empty() {
        out.heading("Skipped (not found):");
        for path in &result.skipped_paths {
            out.line(&format!("  {}", path.display()));
        }
    }
}

fn scope_name(options: &CleanOptions) -> &'static str {
    match (options.packages, options.workspace) {
        (true, true) => "cache",
        (false, true) => "workspace",
        _ => "package cache",
    }
}

/// Total size in bytes of every file under `paths`.
fn total_size(paths: &[PathBuf]) -> u64 {
    paths.iter().map(|p| directory_size(p)).sum()
}

fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
