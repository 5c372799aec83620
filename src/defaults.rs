//! Default values for os-image-composer configuration.
//!
//! This module provides centralized default values used across the library
//! and commands, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Name of the tool, used in file names, SBOM creator fields, and config paths.
pub const TOOL_NAME: &str = "os-image-composer";

/// Default number of concurrent download workers.
pub const DEFAULT_WORKERS: usize = 8;

/// Upper bound accepted for `workers`.
pub const MAX_WORKERS: usize = 100;

/// Upper bound for the checksum verification pool, regardless of `workers`.
pub const MAX_VERIFICATION_WORKERS: usize = 4;

pub const DEFAULT_CONFIG_DIR: &str = "./config";
pub const DEFAULT_CACHE_DIR: &str = "./cache";
pub const DEFAULT_WORK_DIR: &str = "./workspace";
pub const DEFAULT_TEMP_DIR: &str = "./tmp";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FILE: &str = "os-image-composer.log";

/// Subdirectory of the cache dir that holds per-provider package caches.
pub const PKG_CACHE_DIR: &str = "pkgCache";

/// Per-provider workspace subdirectories removed by workspace cleanup.
pub const WORKSPACE_SUBDIRS: [&str; 2] = ["chrootenv", "chrootbuild"];

/// In-image location of the SPDX bill of materials.
pub const SBOM_IMAGE_PATH: &str = "/usr/share/sbom/spdx_manifest.json";

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV_VAR: &str = "OS_IMAGE_COMPOSER_CONFIG";

/// Returns the candidate global config file locations, in search order.
///
/// The current directory is checked first, then the user's home and XDG config
/// directories, then the system-wide location.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("os-image-composer.yml"),
        PathBuf::from("os-image-composer.yaml"),
        PathBuf::from(".os-image-composer.yml"),
        PathBuf::from(".os-image-composer.yaml"),
    ];

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".os-image-composer").join("config.yml"));
    }
    if let Some(config) = dirs::config_dir() {
        paths.push(config.join(TOOL_NAME).join("config.yml"));
    }
    paths.push(PathBuf::from("/etc/os-image-composer/config.yml"));

    paths
}
