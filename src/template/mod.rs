//! # Image Templates
//!
//! An `ImageTemplate` is the declarative description of one image build:
//! image metadata, the target triple, disk layout, system configuration, and
//! extra package repositories. Templates are read from YAML files with these
//! top-level keys:
//!
//! ```yaml
//! image:
//!   name: edge-node
//!   version: "1.0.0"
//! target:
//!   os: azure-linux
//!   dist: azl3
//!   arch: x86_64
//!   imageType: raw
//! systemConfig:
//!   name: edge
//!   packages: [curl]
//! ```
//!
//! A user template is usually partial. It is merged over the vendor default
//! for its target (see [`merge`] and [`defaults`]) to produce the fully
//! resolved template that providers build from.
//!
//! Some fields are derived rather than read from YAML: the directories used
//! to resolve relative paths, and the kernel, bootloader, and full package
//! lists filled in during pre-processing.

pub mod defaults;
pub mod merge;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::has_yaml_extension;
use crate::error::{Error, Result};

pub use merge::merge_templates;
pub use validate::{validate_template, ValidationScope};

/// A complete or partial build description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageTemplate {
    #[serde(default)]
    pub image: ImageInfo,
    #[serde(default)]
    pub target: TargetInfo,
    #[serde(default, skip_serializing_if = "DiskConfig::is_empty")]
    pub disk: DiskConfig,
    #[serde(default)]
    pub system_config: SystemConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_repositories: Vec<PackageRepository>,

    /// Directories searched when resolving relative paths in the template.
    #[serde(skip)]
    pub path_list: Vec<PathBuf>,
    #[serde(skip)]
    pub kernel_packages: Vec<String>,
    #[serde(skip)]
    pub bootloader_packages: Vec<String>,
    /// System, kernel, and bootloader packages, de-duplicated in merge order.
    #[serde(skip)]
    pub full_packages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageInfo {
    pub name: String,
    pub version: String,
}

/// The (os, dist, arch, imageType) tuple that selects a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetInfo {
    pub os: String,
    pub dist: String,
    pub arch: String,
    pub image_type: String,
}

impl TargetInfo {
    pub fn is_empty(&self) -> bool {
        self.os.is_empty()
            && self.dist.is_empty()
            && self.arch.is_empty()
            && self.image_type.is_empty()
    }
}

/// Kinds of artifact a build can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Raw,
    /// An initrd image (`img` in templates).
    Img,
    Iso,
}

impl ImageType {
    pub const ALL: [ImageType; 3] = [ImageType::Raw, ImageType::Img, ImageType::Iso];

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "raw" => Ok(ImageType::Raw),
            "img" => Ok(ImageType::Img),
            "iso" => Ok(ImageType::Iso),
            other => Err(Error::UnsupportedImageType {
                image_type: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Raw => "raw",
            ImageType::Img => "img",
            ImageType::Iso => "iso",
        }
    }

    /// Name used in default config file names (`default-<name>-<arch>.yml`).
    pub fn config_name(&self) -> &'static str {
        match self {
            ImageType::Raw => "raw",
            ImageType::Img => "initrd",
            ImageType::Iso => "iso",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub size: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition_table_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Partition>,
}

impl DiskConfig {
    /// A disk block counts as set when it names a disk, a size, or partitions.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.size.is_empty() && self.partitions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Partition {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub part_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fs_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub end: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mount_point: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemConfig {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(skip_serializing_if = "InitramfsConfig::is_empty")]
    pub initramfs: InitramfsConfig,
    #[serde(skip_serializing_if = "ImmutabilityConfig::is_empty")]
    pub immutability: ImmutabilityConfig,
    #[serde(skip_serializing_if = "Bootloader::is_empty")]
    pub bootloader: Bootloader,
    pub packages: Vec<String>,
    #[serde(skip_serializing_if = "KernelConfig::is_empty")]
    pub kernel: KernelConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_files: Vec<AdditionalFile>,
}

impl SystemConfig {
    /// Whether any field of the block was provided.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.description.is_empty()
            && self.hostname.is_empty()
            && self.initramfs.is_empty()
            && self.immutability.is_empty()
            && self.bootloader.is_empty()
            && self.packages.is_empty()
            && self.kernel.is_empty()
            && self.users.is_empty()
            && self.additional_files.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitramfsConfig {
    pub template: String,
}

impl InitramfsConfig {
    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }
}

/// Immutable root filesystem settings.
///
/// `enabled` is tri-state: `None` means the template did not set it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmutabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "secureBootDBKey", skip_serializing_if = "String::is_empty")]
    pub secure_boot_db_key: String,
    #[serde(rename = "secureBootDBCrt", skip_serializing_if = "String::is_empty")]
    pub secure_boot_db_crt: String,
    #[serde(rename = "secureBootDBCer", skip_serializing_if = "String::is_empty")]
    pub secure_boot_db_cer: String,
}

impl ImmutabilityConfig {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.secure_boot_db_key.is_empty()
            && self.secure_boot_db_crt.is_empty()
            && self.secure_boot_db_cer.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bootloader {
    /// `efi` or `legacy`
    pub boot_type: String,
    /// `grub` or `systemd-boot`
    pub provider: String,
}

impl Bootloader {
    pub fn is_empty(&self) -> bool {
        self.boot_type.is_empty() && self.provider.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KernelConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cmdline: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub enable_extra_modules: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub uki: bool,
}

impl KernelConfig {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.version.is_empty()
            && self.cmdline.is_empty()
            && self.packages.is_empty()
            && self.enable_extra_modules.is_empty()
            && !self.uki
    }
}

/// An account created in the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hash_algo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_max_age: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub startup_script: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sudo: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub home: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,
}

/// A file copied from the host (`local`) into the image (`final`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalFile {
    pub local: String,
    #[serde(rename = "final")]
    pub final_path: String,
}

/// An extra package repository supplied by the template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageRepository {
    pub codename: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pkey: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub component: String,
}

impl ImageTemplate {
    /// Read a template from a `.yml`/`.yaml` file.
    ///
    /// The file's directory becomes the first entry of the path list.
    pub fn load(path: &Path) -> Result<Self> {
        if !has_yaml_extension(path) {
            return Err(Error::ConfigParse {
                message: format!("unsupported template format: {}", path.display()),
                hint: Some("Templates must be .yml or .yaml files".to_string()),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigParse {
            message: format!("failed to read template {}: {}", path.display(), e),
            hint: None,
        })?;

        let mut template = Self::from_yaml_str(&content).map_err(|e| match e {
            Error::ConfigParse { message, hint } => Error::ConfigParse {
                message: format!("{}: {}", path.display(), message),
                hint,
            },
            other => other,
        })?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        template.path_list = vec![dir];
        Ok(template)
    }

    /// Parse a template from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            let message = e.to_string();
            let hint = message.contains("unknown field").then(|| {
                "Top-level keys are image, target, disk, systemConfig, packageRepositories"
                    .to_string()
            });
            Error::ConfigParse { message, hint }
        })
    }

    /// Serialize the template (without derived fields) to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// `<os>-<dist>-<arch>` for this template's target.
    pub fn provider_id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.target.os, self.target.dist, self.target.arch
        )
    }

    pub fn image_type(&self) -> Result<ImageType> {
        ImageType::parse(&self.target.image_type)
    }

    pub fn user(&self, name: &str) -> Option<&UserConfig> {
        self.system_config.users.iter().find(|u| u.name == name)
    }

    /// Recompute `full_packages` from the system, kernel, and bootloader lists.
    pub fn refresh_full_packages(&mut self) {
        let mut all = Vec::new();
        for name in self
            .system_config
            .packages
            .iter()
            .chain(&self.kernel_packages)
            .chain(&self.bootloader_packages)
        {
            if !all.contains(name) {
                all.push(name.clone());
            }
        }
        self.full_packages = all;
    }

    /// Packages to install: the derived full list if populated, else the
    /// system package list.
    pub fn packages(&self) -> &[String] {
        if self.full_packages.is_empty() {
            &self.system_config.packages
        } else {
            &self.full_packages
        }
    }

    /// Resolve a template-relative path against the path list.
    ///
    /// Absolute paths are returned as-is. Relative paths resolve to the first
    /// existing candidate.
    pub fn resolve_path(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        self.path_list
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
    }
}
