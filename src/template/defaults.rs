//! Vendor default templates.
//!
//! Each supported target ships a default template under the config tree:
//!
//! ```text
//! <config_dir>/osv/<os>/<dist>/imageconfigs/defaultconfigs/default-<kind>-<arch>.yml
//! ```
//!
//! where `<kind>` is `raw`, `initrd` (for `img`), or `iso`.

use log::{info, warn};
use std::path::{Path, PathBuf};

use super::{merge_templates, validate_template, ImageTemplate, ImageType, ValidationScope};
use crate::config::GlobalConfig;
use crate::error::{Error, Result};

/// Locates and loads default templates for one (os, dist, arch) target.
#[derive(Debug, Clone)]
pub struct DefaultConfigLoader {
    config_dir: PathBuf,
    os: String,
    dist: String,
    arch: String,
}

impl DefaultConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>, os: &str, dist: &str, arch: &str) -> Self {
        Self {
            config_dir: config_dir.into(),
            os: os.to_string(),
            dist: dist.to_string(),
            arch: arch.to_string(),
        }
    }

    /// `<config_dir>/osv/<os>/<dist>`
    pub fn target_dir(&self) -> PathBuf {
        self.config_dir.join("osv").join(&self.os).join(&self.dist)
    }

    /// Path of the default template for `image_type`.
    pub fn default_config_path(&self, image_type: &str) -> Result<PathBuf> {
        let kind = ImageType::parse(image_type)?;
        Ok(self
            .target_dir()
            .join("imageconfigs")
            .join("defaultconfigs")
            .join(format!("default-{}-{}.yml", kind.config_name(), self.arch)))
    }

    /// Load the default template for `image_type`.
    pub fn load_default(&self, image_type: &str) -> Result<ImageTemplate> {
        let path = self.default_config_path(image_type)?;
        if !path.is_file() {
            return Err(Error::DefaultConfigNotFound {
                path: path.display().to_string(),
            });
        }
        info!("Loading default template {}", path.display());
        ImageTemplate::load(&path)
    }
}

/// Load a user template and merge it over its target's vendor default.
///
/// When no default exists the user template is used on its own and a warning
/// is logged.
pub fn load_and_merge(user_path: &Path, config: &GlobalConfig) -> Result<ImageTemplate> {
    let user = ImageTemplate::load(user_path)?;
    validate_template(&user, ValidationScope::User, &user_path.display().to_string())?;

    let loader = DefaultConfigLoader::new(
        &config.config_dir,
        &user.target.os,
        &user.target.dist,
        &user.target.arch,
    );

    match loader.load_default(&user.target.image_type) {
        Ok(default) => Ok(merge_templates(&user, &default)),
        Err(Error::DefaultConfigNotFound { path }) => {
            warn!(
                "No default configuration at {}, using user template only",
                path
            );
            Ok(user)
        }
        Err(e) => Err(e),
    }
}
