//! SHA-256 verification of downloaded packages.
//!
//! Hashing is CPU-bound, so it runs on its own pool capped at
//! [`MAX_VERIFICATION_WORKERS`] threads regardless of the download worker
//! count.

use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::PackageInfo;
use crate::defaults::MAX_VERIFICATION_WORKERS;
use crate::error::{Error, Result};

/// Hex-encoded SHA-256 digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verify each package's cached artifact in `dir` against its published
/// SHA-256 digest. Packages without one are skipped.
///
/// Returns the number of artifacts verified.
pub fn verify_packages(packages: &[PackageInfo], dir: &Path, workers: usize) -> Result<usize> {
    let threads = workers.clamp(1, MAX_VERIFICATION_WORKERS);
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Verification {
            path: dir.display().to_string(),
            message: format!("failed to start verification pool: {}", e),
        })?;

    let checked: Vec<bool> = pool.install(|| {
        packages
            .par_iter()
            .map(|pkg| verify_one(pkg, dir))
            .collect::<Result<Vec<bool>>>()
    })?;

    let verified = checked.into_iter().filter(|v| *v).count();
    debug!("Verified {} of {} packages", verified, packages.len());
    Ok(verified)
}

fn verify_one(pkg: &PackageInfo, dir: &Path) -> Result<bool> {
    let Some(expected) = pkg.checksum("sha256") else {
        warn!("{} has no sha256 checksum, skipping verification", pkg.name);
        return Ok(false);
    };

    let path = dir.join(pkg.file_name());
    let actual = sha256_file(&path).map_err(|e| Error::Verification {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::Verification {
            path: path.display().to_string(),
            message: format!("sha256 mismatch: expected {}, got {}", expected, actual),
        });
    }
    Ok(true)
}
