//! Host tool detection and installation.
//!
//! Image builds shell out to host tools (`mkfs.fat`, `qemu-img`, ...). Before
//! a build, each provider checks its command table and installs the packages
//! for missing commands with the host's package manager.

use log::{debug, info};
use std::fmt;
use std::fs;
use std::process::Command;

use crate::error::{Error, Result};

/// Command to package table for RPM-based providers.
pub const RPM_HOST_DEPENDENCIES: &[(&str, &str)] = &[
    ("rpm", "rpm"),
    ("mkfs.fat", "dosfstools"),
    ("qemu-img", "qemu-utils"),
    ("xorriso", "xorriso"),
    ("sbsign", "sbsigntool"),
];

/// Command to package table for DEB-based providers.
pub const DEB_HOST_DEPENDENCIES: &[(&str, &str)] = &[
    ("mmdebstrap", "mmdebstrap"),
    ("mkfs.fat", "dosfstools"),
    ("mformat", "mtools"),
    ("qemu-img", "qemu-utils"),
    ("xorriso", "xorriso"),
    ("ukify", "systemd-ukify"),
    ("grub-mkimage", "grub-common"),
    ("veritysetup", "cryptsetup"),
    ("sbsign", "sbsigntool"),
    ("rpm", "rpm"),
];

const OS_RELEASE: &str = "/etc/os-release";

/// Package manager of the build host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPackageManager {
    Apt,
    Yum,
    Tdnf,
}

impl HostPackageManager {
    /// Detect the package manager from `/etc/os-release`.
    pub fn detect() -> Result<Self> {
        let content = fs::read_to_string(OS_RELEASE).map_err(|e| Error::HostDependency {
            tool: "package manager".to_string(),
            message: format!("failed to read {}: {}", OS_RELEASE, e),
        })?;
        Self::from_os_release(&content)
    }

    /// Pick the package manager for the `NAME=` entry of an os-release document.
    pub fn from_os_release(content: &str) -> Result<Self> {
        let name = content
            .lines()
            .find_map(|line| line.strip_prefix("NAME="))
            .map(|value| value.trim().trim_matches('"').to_string())
            .unwrap_or_default();

        let manager = if ["Ubuntu", "Debian", "eLxr"].iter().any(|n| name.contains(n)) {
            HostPackageManager::Apt
        } else if ["Fedora", "CentOS", "Red Hat"].iter().any(|n| name.contains(n)) {
            HostPackageManager::Yum
        } else if ["Azure Linux", "Edge Microvisor", "Mariner"]
            .iter()
            .any(|n| name.contains(n))
        {
            HostPackageManager::Tdnf
        } else {
            return Err(Error::HostDependency {
                tool: "package manager".to_string(),
                message: format!("unsupported host OS '{}'", name),
            });
        };
        Ok(manager)
    }

    pub fn program(&self) -> &'static str {
        match self {
            HostPackageManager::Apt => "apt",
            HostPackageManager::Yum => "yum",
            HostPackageManager::Tdnf => "tdnf",
        }
    }
}

impl fmt::Display for HostPackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Trait for host tool operations - allows mocking in tests
pub trait HostTools: Send + Sync {
    /// Whether `cmd` is available on `PATH`.
    fn command_exists(&self, cmd: &str) -> bool;

    /// Install `package` with `manager`.
    fn install(&self, manager: HostPackageManager, package: &str) -> Result<()>;

    fn package_manager(&self) -> Result<HostPackageManager> {
        HostPackageManager::detect()
    }
}

/// The default `HostTools`, which looks commands up with `which` and runs
/// the host package manager.
pub struct SystemHostTools;

impl HostTools for SystemHostTools {
    fn command_exists(&self, cmd: &str) -> bool {
        which::which(cmd).is_ok()
    }

    fn install(&self, manager: HostPackageManager, package: &str) -> Result<()> {
        info!("Installing host package {} with {}", package, manager);
        let output = Command::new(manager.program())
            .args(["install", "-y", package])
            .output()
            .map_err(|e| Error::HostDependency {
                tool: package.to_string(),
                message: format!("failed to run {}: {}", manager, e),
            })?;

        if !output.status.success() {
            return Err(Error::HostDependency {
                tool: package.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Install the packages for every command of `dependencies` missing on the
/// host. Returns the packages installed.
pub fn ensure_host_dependencies(
    tools: &dyn HostTools,
    dependencies: &[(&str, &str)],
) -> Result<Vec<String>> {
    let mut missing: Vec<&str> = Vec::new();
    for &(cmd, package) in dependencies {
        if tools.command_exists(cmd) {
            debug!("Host command {} found", cmd);
        } else if !missing.contains(&package) {
            missing.push(package);
        }
    }

    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let manager = tools.package_manager()?;
    for package in &missing {
        tools.install(manager, package)?;
    }
    Ok(missing.into_iter().map(String::from).collect())
}
