//! Removal of cached packages and provider workspaces.
//!
//! The package cache lives under `<cacheDir>/pkgCache/<providerId>` and each
//! provider's chroot workspace under `<workDir>/<providerId>/{chrootenv,chrootbuild}`.
//! [`Cleaner`] collects the targets selected by [`CleanOptions`], checks that
//! every target lies strictly inside its root, and only then deletes anything.

use log::{debug, info};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::defaults::{PKG_CACHE_DIR, WORKSPACE_SUBDIRS};
use crate::error::{Error, Result};

/// What to clean.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Remove downloaded packages.
    pub packages: bool,
    /// Remove chroot workspaces.
    pub workspace: bool,
    /// Restrict cleanup to one provider.
    pub provider_id: Option<String>,
    /// List targets without deleting them.
    pub dry_run: bool,
}

/// Outcome of a cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanResult {
    /// Paths removed, or that would be removed in a dry run.
    pub removed_paths: Vec<PathBuf>,
    /// Provider targets that were requested but do not exist.
    pub skipped_paths: Vec<PathBuf>,
}

/// A path scheduled for deletion with the root it must stay inside.
struct Target {
    path: PathBuf,
    root: PathBuf,
}

/// Deletes package cache and workspace entries.
pub struct Cleaner {
    cache_dir: PathBuf,
    work_dir: PathBuf,
}

impl Cleaner {
    pub fn new(cache_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn clean(&self, options: &CleanOptions) -> Result<CleanResult> {
        if !options.packages && !options.workspace {
            return Err(Error::Cleanup {
                message: "at least one of packages or workspace must be selected".to_string(),
            });
        }

        let mut result = CleanResult::default();
        let mut targets = Vec::new();
        if options.packages {
            targets.extend(self.package_targets(options.provider_id.as_deref(), &mut result)?);
        }
        if options.workspace {
            targets.extend(self.workspace_targets(options.provider_id.as_deref())?);
        }

        for target in &targets {
            ensure_sub_path(&target.path, &target.root)?;
        }

        for target in targets {
            if options.dry_run {
                debug!("Would remove {}", target.path.display());
            } else {
                remove_path(&target.path)?;
                info!("Removed {}", target.path.display());
            }
            result.removed_paths.push(target.path);
        }

        result.removed_paths.sort();
        result.skipped_paths.sort();
        Ok(result)
    }

    fn package_targets(&self, provider_id: Option<&str>, result: &mut CleanResult) -> Result<Vec<Target>> {
        let root = self.cache_dir.join(PKG_CACHE_DIR);
        if let Some(id) = provider_id {
            ensure_sub_path(&root.join(id), &root)?;
        }
        if !root.exists() {
            debug!("Package cache {} does not exist", root.display());
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        match provider_id {
            Some(id) => {
                let path = root.join(id);
                if path.exists() {
                    targets.push(Target { path, root });
                } else {
                    result.skipped_paths.push(path);
                }
            }
            None => {
                for entry in fs::read_dir(&root)? {
                    targets.push(Target {
                        path: entry?.path(),
                        root: root.clone(),
                    });
                }
            }
        }
        Ok(targets)
    }

    fn workspace_targets(&self, provider_id: Option<&str>) -> Result<Vec<Target>> {
        let root = self.work_dir.clone();
        if let Some(id) = provider_id {
            ensure_sub_path(&root.join(id), &root)?;
        }
        if !root.exists() {
            debug!("Work directory {} does not exist", root.display());
            return Ok(Vec::new());
        }

        let provider_dirs = match provider_id {
            Some(id) => vec![root.join(id)],
            None => {
                let mut dirs = Vec::new();
                for entry in fs::read_dir(&root)? {
                    let path = entry?.path();
                    if path.is_dir() {
                        dirs.push(path);
                    }
                }
                dirs
            }
        };

        let mut targets = Vec::new();
        for dir in provider_dirs {
            for sub in WORKSPACE_SUBDIRS {
                let path = dir.join(sub);
                if path.exists() {
                    targets.push(Target {
                        path,
                        root: root.clone(),
                    });
                }
            }
        }
        Ok(targets)
    }
}

fn remove_path(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)?;
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| Error::Cleanup {
        message: format!("failed to remove {}: {}", path.display(), e),
    })
}

/// Make `path` absolute and resolve `.` and `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Whether `path` lies inside `root` and is not `root` itself.
pub fn is_strict_sub_path(path: &Path, root: &Path) -> Result<bool> {
    let path = normalize(path)?;
    let root = normalize(root)?;
    Ok(path != root && path.starts_with(&root))
}

/// Fail with `PathEscape` unless `path` is strictly inside `root`.
pub fn ensure_sub_path(path: &Path, root: &Path) -> Result<()> {
    if is_strict_sub_path(path, root)? {
        Ok(())
    } else {
        Err(Error::PathEscape {
            path: path.display().to_string(),
            root: root.display().to_string(),
        })
    }
}
