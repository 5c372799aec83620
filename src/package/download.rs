//! Parallel package downloads into the package cache.
//!
//! Downloads run on a dedicated rayon pool sized to the configured worker
//! count. Each package writes to its own file, so workers never contend on
//! the cache. The first failure stops new downloads and is returned.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::PackageInfo;
use crate::error::{Error, Result};
use crate::repo::fetch::Fetcher;

/// Downloads package artifacts on a bounded worker pool.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    workers: usize,
    show_progress: bool,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, workers: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            show_progress: true,
        }
    }

    /// Enable or disable the progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    /// Download `packages` into `dest_dir`.
    ///
    /// Files that already exist with a non-zero size are kept. Returns the
    /// local path of every package, in input order.
    pub fn download_packages(&self, packages: &[PackageInfo], dest_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dest_dir)?;
        if packages.is_empty() {
            return Ok(Vec::new());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::Download {
                package: "*".to_string(),
                message: format!("failed to start download pool: {}", e),
            })?;

        info!(
            "Downloading {} packages to {} with {} workers",
            packages.len(),
            dest_dir.display(),
            self.workers
        );
        let bar = self.progress_bar(packages.len());
        let fetched = AtomicUsize::new(0);

        let outcome = pool.install(|| {
            packages.par_iter().try_for_each(|pkg| {
                bar.set_message(pkg.name.clone());
                if self.download_one(pkg, dest_dir)? {
                    fetched.fetch_add(1, Ordering::Relaxed);
                }
                bar.inc(1);
                Ok::<(), Error>(())
            })
        });

        match outcome {
            Ok(()) => bar.finish_and_clear(),
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        }

        let fetched = fetched.into_inner();
        info!(
            "Downloaded {} packages, {} already cached",
            fetched,
            packages.len() - fetched
        );

        Ok(packages
            .iter()
            .map(|pkg| dest_dir.join(pkg.file_name()))
            .collect())
    }

    /// Download one package. Returns `false` when the cached copy was kept.
    fn download_one(&self, pkg: &PackageInfo, dest_dir: &Path) -> Result<bool> {
        if pkg.url.is_empty() {
            return Err(Error::Download {
                package: pkg.name.clone(),
                message: "package has no download URL".to_string(),
            });
        }

        let file_name = pkg.file_name();
        let dest = dest_dir.join(&file_name);
        if let Ok(meta) = fs::metadata(&dest) {
            if meta.len() > 0 {
                debug!("{} already cached", file_name);
                return Ok(false);
            }
            warn!("{} is empty, downloading again", dest.display());
        }

        let partial = dest_dir.join(format!("{}.part", file_name));
        self.fetcher
            .download(&pkg.url, &partial)
            .map_err(|e| Error::Download {
                package: pkg.name.clone(),
                message: e.to_string(),
            })?;
        fs::rename(&partial, &dest)?;
        debug!("Downloaded {}", file_name);
        Ok(true)
    }
}
