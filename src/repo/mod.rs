//! # Repository Resolution
//!
//! Turns a target (os, dist, arch) into the package repositories a build
//! downloads from. Each resolved repository is a [`RepositoryDescriptor`]
//! holding its base URL, the location of its package index, and its GPG key.
//!
//! ## Design
//!
//! RPM and DEB ecosystems describe repositories differently:
//!
//! - **RPM** ([`rpm`]): a remote `config.repo` INI document names the
//!   repository, and a remote `repodata/repomd.xml` points at the primary
//!   package index.
//! - **DEB** ([`deb`]): a local provider repository file lists one or more
//!   repositories, whose index location is derived from the base URL.
//!
//! All network access goes through the [`fetch::Fetcher`] trait, so the
//! resolvers can be exercised in tests without a network.

pub mod deb;
pub mod fetch;
pub mod rpm;

use std::fmt;
use url::Url;

use crate::error::Result;

/// Package format of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoType {
    Rpm,
    Deb,
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoType::Rpm => f.write_str("rpm"),
            RepoType::Deb => f.write_str("deb"),
        }
    }
}

/// Connection and location details for one resolved repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryDescriptor {
    pub repo_type: RepoType,
    pub name: String,
    /// Base URL that relative package locations are joined to.
    pub base_url: String,
    /// Package index location: a URL (DEB) or an href relative to `base_url` (RPM).
    pub index_location: String,
    pub gpg_key_url: String,
    pub component: String,
    pub enabled: bool,
    pub gpg_check: bool,
    pub repo_gpg_check: bool,
    /// Prefix for DEB `Filename` entries; empty for RPM.
    pub pkg_prefix: String,
    /// Local build path associated with a DEB repository.
    pub build_path: String,
}

impl RepositoryDescriptor {
    /// Absolute URL of the package index.
    pub fn index_url(&self) -> Result<String> {
        join_url(&self.base_url, &self.index_location)
    }

    /// Base that package file locations are relative to.
    pub fn package_base(&self) -> &str {
        match self.repo_type {
            RepoType::Rpm => &self.base_url,
            RepoType::Deb => &self.pkg_prefix,
        }
    }
}

/// Whether `s` is an absolute URL (has a scheme).
pub fn is_absolute_url(s: &str) -> bool {
    Url::parse(s).is_ok()
}

/// Join `relative` onto `base`, treating `base` as a directory.
///
/// Absolute URLs are returned unchanged.
pub fn join_url(base: &str, relative: &str) -> Result<String> {
    if is_absolute_url(relative) {
        return Ok(relative.to_string());
    }
    let base = if base.ends_with('/') {
        Url::parse(base)?
    } else {
        Url::parse(&format!("{}/", base))?
    };
    Ok(base.join(relative.trim_start_matches('/'))?.to_string())
}
