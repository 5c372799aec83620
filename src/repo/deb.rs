//! DEB repository resolution.
//!
//! DEB providers read their repositories from a local provider repository
//! file:
//!
//! ```yaml
//! repositories:
//!   - name: "Wind River eLxr 12"
//!     type: deb
//!     baseURL: "https://mirror.elxr.dev/elxr/dists/aria/main"
//!     gpgKey: "https://mirror.elxr.dev/elxr/public.gpg"
//!     component: main
//!     buildPath: ./builds/elxr12
//! ```
//!
//! A `{arch}` placeholder in `baseURL` is replaced with the Debian
//! architecture name, and each repository's index is found at
//! `<baseURL>/binary-<arch>/Packages.gz`.

use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{RepoType, RepositoryDescriptor};
use crate::error::{Error, Result};
use crate::template::PackageRepository;

const DEFAULT_COMPONENT: &str = "main";

/// One entry of a provider repository file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebRepoEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub repo_type: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// URL that package `Filename` entries are relative to.
    pub pkg_prefix: Option<String>,
    pub gpg_key: String,
    pub component: Option<String>,
    pub build_path: String,
    pub enabled: Option<bool>,
    pub gpg_check: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ProviderRepoFile {
    #[serde(default)]
    repositories: Vec<DebRepoEntry>,
}

/// `<config_dir>/osv/<os>/<dist>/providerconfigs/repos.yml`
pub fn provider_repo_config_path(config_dir: &Path, os: &str, dist: &str) -> PathBuf {
    config_dir
        .join("osv")
        .join(os)
        .join(dist)
        .join("providerconfigs")
        .join("repos.yml")
}

/// Load the repository entries of a provider repository file.
pub fn load_provider_repo_config(path: &Path) -> Result<Vec<DebRepoEntry>> {
    let content = fs::read_to_string(path).map_err(|e| Error::Resolution {
        repo: path.display().to_string(),
        message: format!("failed to read provider repository config: {}", e),
    })?;
    let file: ProviderRepoFile = serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
        message: format!("{}: {}", path.display(), e),
        hint: None,
    })?;
    Ok(file.repositories)
}

/// Debian architecture name for a target architecture.
pub fn deb_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Package prefix implied by a `.../dists/<suite>/<component>` base URL.
fn derive_pkg_prefix(base_url: &str) -> String {
    match base_url.find("/dists/") {
        Some(index) => format!("{}/", &base_url[..index]),
        None => format!("{}/", base_url.trim_end_matches('/')),
    }
}

/// Resolve DEB repository entries for `arch`.
///
/// Entries whose type is not `deb`, or that have no base URL, are skipped with
/// a warning. At least one entry must resolve.
pub fn resolve_deb_repositories(
    entries: &[DebRepoEntry],
    arch: &str,
) -> Result<Vec<RepositoryDescriptor>> {
    let arch = deb_arch(arch);
    let mut repos = Vec::new();

    for entry in entries {
        if !entry.repo_type.eq_ignore_ascii_case("deb") {
            warn!(
                "Skipping repository '{}' with unsupported type '{}'",
                entry.name, entry.repo_type
            );
            continue;
        }
        if entry.base_url.is_empty() {
            warn!("Skipping repository '{}' without baseURL", entry.name);
            continue;
        }

        let base_url = entry
            .base_url
            .replace("{arch}", arch)
            .trim_end_matches('/')
            .to_string();
        let pkg_prefix = entry
            .pkg_prefix
            .as_deref()
            .map(|p| format!("{}/", p.replace("{arch}", arch).trim_end_matches('/')))
            .unwrap_or_else(|| derive_pkg_prefix(&base_url));
        let index_location = format!("{}/binary-{}/Packages.gz", base_url, arch);
        debug!("DEB repository '{}' index {}", entry.name, index_location);

        repos.push(RepositoryDescriptor {
            repo_type: RepoType::Deb,
            name: entry.name.clone(),
            base_url,
            index_location,
            gpg_key_url: entry.gpg_key.clone(),
            component: entry
                .component
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_COMPONENT.to_string()),
            enabled: entry.enabled.unwrap_or(true),
            gpg_check: entry.gpg_check.unwrap_or(true),
            repo_gpg_check: false,
            pkg_prefix,
            build_path: entry.build_path.clone(),
        });
    }

    if repos.is_empty() {
        return Err(Error::Resolution {
            repo: "deb".to_string(),
            message: "no valid DEB repositories found".to_string(),
        });
    }
    Ok(repos)
}

/// Descriptor for an extra DEB repository supplied by a template.
pub fn user_deb_repository(repo: &PackageRepository, arch: &str) -> RepositoryDescriptor {
    let arch = deb_arch(arch);
    let url = repo.url.trim_end_matches('/');
    let component = if repo.component.is_empty() {
        DEFAULT_COMPONENT
    } else {
        repo.component.as_str()
    };
    let base_url = format!("{}/dists/{}/{}", url, repo.codename, component);

    RepositoryDescriptor {
        repo_type: RepoType::Deb,
        name: repo.codename.clone(),
        index_location: format!("{}/binary-{}/Packages.gz", base_url, arch),
        base_url,
        gpg_key_url: repo.pkey.clone(),
        component: component.to_string(),
        enabled: true,
        gpg_check: !repo.pkey.is_empty(),
        repo_gpg_check: false,
        pkg_prefix: format!("{}/", url),
        build_path: String::new(),
    }
}
