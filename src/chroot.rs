//! Chroot build-root management.
//!
//! Each provider builds inside `<workDir>/<providerId>/chrootenv`. The
//! [`ChrootManager`] trait is the seam between the provider lifecycle and
//! whatever materializes that tree; [`WorkspaceChroot`] lays out the
//! directories and applies the bootloader and kernel package rules.

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::template::ImageTemplate;

/// Trait for chroot operations - allows mocking in tests
pub trait ChrootManager: Send + Sync {
    /// Materialize the chroot environment for a target.
    fn init_chroot_env(&self, os: &str, dist: &str, arch: &str) -> Result<()>;

    /// Tear down the transient parts of the chroot environment.
    fn cleanup_chroot_env(&self, os: &str, dist: &str, arch: &str) -> Result<()>;

    /// Fill in the kernel and bootloader package lists of `template`.
    fn update_system_pkgs(&self, template: &mut ImageTemplate) -> Result<()>;
}

/// The default `ChrootManager`, rooted at the global work directory.
pub struct WorkspaceChroot {
    work_dir: PathBuf,
}

impl WorkspaceChroot {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn provider_dir(&self, os: &str, dist: &str, arch: &str) -> PathBuf {
        self.work_dir.join(format!("{}-{}-{}", os, dist, arch))
    }

    /// `<workDir>/<id>/chrootenv`
    pub fn chroot_env_root(&self, os: &str, dist: &str, arch: &str) -> PathBuf {
        self.provider_dir(os, dist, arch).join("chrootenv")
    }

    /// `<workDir>/<id>/chrootbuild`
    pub fn chroot_build_dir(&self, os: &str, dist: &str, arch: &str) -> PathBuf {
        self.provider_dir(os, dist, arch).join("chrootbuild")
    }

    /// The image build directory inside the chroot.
    pub fn chroot_image_build_dir(&self, os: &str, dist: &str, arch: &str) -> PathBuf {
        self.chroot_env_root(os, dist, arch)
            .join("workspace")
            .join("imagebuild")
    }
}

fn create_dir(operation: &str, path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::Chroot {
        operation: operation.to_string(),
        message: format!("failed to create {}: {}", path.display(), e),
    })
}

impl ChrootManager for WorkspaceChroot {
    fn init_chroot_env(&self, os: &str, dist: &str, arch: &str) -> Result<()> {
        create_dir("init", &self.chroot_build_dir(os, dist, arch))?;
        create_dir("init", &self.chroot_image_build_dir(os, dist, arch))?;
        info!(
            "Chroot environment ready at {}",
            self.chroot_env_root(os, dist, arch).display()
        );
        Ok(())
    }

    fn cleanup_chroot_env(&self, os: &str, dist: &str, arch: &str) -> Result<()> {
        let workspace = self.chroot_env_root(os, dist, arch).join("workspace");
        if !workspace.exists() {
            debug!("No chroot workspace at {}", workspace.display());
            return Ok(());
        }
        fs::remove_dir_all(&workspace).map_err(|e| Error::Chroot {
            operation: "cleanup".to_string(),
            message: format!("failed to remove {}: {}", workspace.display(), e),
        })
    }

    fn update_system_pkgs(&self, template: &mut ImageTemplate) -> Result<()> {
        let bootloader = &template.system_config.bootloader;
        match bootloader.provider.as_str() {
            "grub" => {
                if bootloader.boot_type != "efi" && bootloader.boot_type != "legacy" {
                    return Err(Error::Chroot {
                        operation: "update system packages".to_string(),
                        message: format!("unsupported boot type: {}", bootloader.boot_type),
                    });
                }
            }
            "systemd-boot" => {}
            other => {
                return Err(Error::Chroot {
                    operation: "update system packages".to_string(),
                    message: format!("unsupported bootloader provider: {}", other),
                })
            }
        }

        template.bootloader_packages = Vec::new();
        template.kernel_packages = template.system_config.kernel.packages.clone();
        template.refresh_full_packages();
        Ok(())
    }
}
