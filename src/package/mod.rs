//! # Package Handling
//!
//! Everything between a resolved repository and a populated package cache:
//!
//! - [`index`]: decode RPM and DEB package indices into [`PackageInfo`] records.
//! - [`resolve`]: match requested names and compute the dependency closure.
//! - [`download`]: fetch artifacts into the provider's cache on a bounded
//!   worker pool.
//! - [`verify`]: check SHA-256 digests of downloaded artifacts on a second,
//!   smaller pool.
//! - [`sbom`]: write an SPDX bill of materials for the packages of a build.

pub mod download;
pub mod index;
pub mod resolve;
pub mod sbom;
pub mod verify;

use serde::{Deserialize, Serialize};

/// A digest published for a package artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// Lowercase algorithm name, e.g. `sha256`.
    pub algorithm: String,
    pub value: String,
}

/// One package as listed in a repository index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    /// `rpm` or `deb`.
    pub pkg_type: String,
    pub version: String,
    pub arch: String,
    /// Absolute download URL of the artifact.
    pub url: String,
    pub description: String,
    /// Maintainer or packager, e.g. `Jane Doe <jane@example.com>`.
    pub origin: String,
    pub license: String,
    pub checksums: Vec<Checksum>,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
}

impl PackageInfo {
    /// The digest for `algorithm`, if the index published one.
    pub fn checksum(&self, algorithm: &str) -> Option<&str> {
        self.checksums
            .iter()
            .find(|c| c.algorithm.eq_ignore_ascii_case(algorithm))
            .map(|c| c.value.as_str())
    }

    /// File name of the artifact in the package cache.
    pub fn file_name(&self) -> String {
        let tail = self
            .url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name);
        tail.split(['?', '#']).next().unwrap_or(tail).to_string()
    }
}
