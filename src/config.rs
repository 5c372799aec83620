//! # Global Configuration
//!
//! The tool-wide settings that every build shares: worker count, the config,
//! cache, work, and temp directories, and logging. A `GlobalConfig` is built
//! once at process start (file, then command-line overrides, then validation)
//! and is passed explicitly to every component that needs it. Nothing in the
//! library reads configuration from global state.
//!
//! ## File format
//!
//! ```yaml
//! workers: 8
//! config_dir: ./config
//! cache_dir: ./cache
//! work_dir: ./workspace
//! temp_dir: ./tmp
//! logging:
//!   level: info
//!   file: os-image-composer.log
//! ```
//!
//! Missing keys take their defaults. Only `.yml` and `.yaml` files are read.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;
use crate::error::{Error, Result};

/// Log levels accepted in `logging.level`.
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Tool-wide settings shared by all components of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Number of concurrent package downloads.
    pub workers: usize,
    /// Root of the vendor configuration tree (`osv/<os>/<dist>/...`).
    pub config_dir: PathBuf,
    /// Root of the package cache.
    pub cache_dir: PathBuf,
    /// Root of per-provider chroot workspaces.
    pub work_dir: PathBuf,
    /// Scratch directory for generated files such as the SBOM.
    pub temp_dir: PathBuf,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file path; empty disables file logging.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            file: defaults::DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            workers: defaults::DEFAULT_WORKERS,
            config_dir: PathBuf::from(defaults::DEFAULT_CONFIG_DIR),
            cache_dir: PathBuf::from(defaults::DEFAULT_CACHE_DIR),
            work_dir: PathBuf::from(defaults::DEFAULT_WORK_DIR),
            temp_dir: PathBuf::from(defaults::DEFAULT_TEMP_DIR),
            logging: LoggingConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl GlobalConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !has_yaml_extension(path) {
            return Err(Error::ConfigParse {
                message: format!("unsupported config file format: {}", path.display()),
                hint: Some("Global configuration must be a .yml or .yaml file".to_string()),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| Error::ConfigParse {
            message: format!("failed to read {}: {}", path.display(), e),
            hint: None,
        })?;

        let config = if content.trim().is_empty() {
            GlobalConfig::default()
        } else {
            serde_yaml::from_str::<GlobalConfig>(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e),
                hint: None,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Locate and load the global config.
    ///
    /// An explicit path must exist. Without one, the first file found in
    /// [`defaults::config_search_paths`] is used, and the built-in defaults
    /// apply when none exists. Returns the config and the file it came from.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::ConfigParse {
                    message: format!("configuration file not found: {}", path.display()),
                    hint: Some("Run 'os-image-composer config init' to create one".to_string()),
                });
            }
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        for candidate in defaults::config_search_paths() {
            if candidate.is_file() {
                debug!("Using global config {}", candidate.display());
                let config = Self::load(&candidate)?;
                return Ok((config, Some(candidate)));
            }
        }

        debug!("No global config file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Apply command-line overrides and re-validate.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(dir) = &overrides.cache_dir {
            self.cache_dir = dir.clone();
        }
        if let Some(dir) = &overrides.work_dir {
            self.work_dir = dir.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.to_lowercase();
        }
        self.validate()
    }

    /// Check value ranges and required directories.
    pub fn validate(&self) -> Result<()> {
        if self.workers < 1 || self.workers > defaults::MAX_WORKERS {
            return Err(Error::ConfigValidation {
                field: "workers".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    defaults::MAX_WORKERS,
                    self.workers
                ),
            });
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                field: "cache_dir".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                field: "work_dir".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::ConfigValidation {
                field: "logging.level".to_string(),
                message: format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Size of the checksum verification pool.
    pub fn verification_workers(&self) -> usize {
        self.workers.min(defaults::MAX_VERIFICATION_WORKERS)
    }

    /// `<cache_dir>/pkgCache`
    pub fn pkg_cache_root(&self) -> PathBuf {
        self.cache_dir.join(defaults::PKG_CACHE_DIR)
    }

    /// `<cache_dir>/pkgCache/<provider_id>`
    pub fn pkg_cache_dir(&self, provider_id: &str) -> PathBuf {
        self.pkg_cache_root().join(provider_id)
    }

    /// `<work_dir>/<provider_id>`
    pub fn provider_work_dir(&self, provider_id: &str) -> PathBuf {
        self.work_dir.join(provider_id)
    }

    /// Render the config as YAML with explanatory comments.
    pub fn to_commented_yaml(&self) -> String {
        format!(
            "# os-image-composer global configuration\n\
             \n\
             # Number of concurrent package downloads (1-{max})\n\
             workers: {workers}\n\
             \n\
             # Vendor configuration tree (osv/<os>/<dist>/...)\n\
             config_dir: {config_dir}\n\
             \n\
             # Package cache root; packages land in <cache_dir>/pkgCache/<provider>\n\
             cache_dir: {cache_dir}\n\
             \n\
             # Chroot workspaces; <work_dir>/<provider>/{{chrootenv,chrootbuild}}\n\
             work_dir: {work_dir}\n\
             \n\
             # Scratch space for generated files\n\
             temp_dir: {temp_dir}\n\
             \n\
             logging:\n\
             \x20 # One of: debug, info, warn, error\n\
             \x20 level: {level}\n\
             \x20 # Log file; leave empty to log to stderr only\n\
             \x20 file: \"{file}\"\n",
            max = defaults::MAX_WORKERS,
            workers = self.workers,
            config_dir = self.config_dir.display(),
            cache_dir = self.cache_dir.display(),
            work_dir = self.work_dir.display(),
            temp_dir = self.temp_dir.display(),
            level = self.logging.level,
            file = self.logging.file,
        )
    }

    /// Write the commented YAML form of this config to `path`.
    pub fn save_with_comments(&self, path: &Path) -> Result<()> {
        if !has_yaml_extension(path) {
            return Err(Error::ConfigParse {
                message: format!("unsupported config file format: {}", path.display()),
                hint: Some("Use a .yml or .yaml file name".to_string()),
            });
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_commented_yaml())?;
        Ok(())
    }
}

/// Whether `path` has a `.yml` or `.yaml` extension.
pub fn has_yaml_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}
