//! # OS Image Composer Library
//!
//! This library builds bootable Linux OS images (raw disks, ISOs, initrds)
//! for several RPM- and DEB-based distributions from declarative YAML
//! templates. It is used by the `os-image-composer` command-line tool but can
//! also be driven directly, with every external collaborator replaceable.
//!
//! ## Quick Example
//!
//! ```
//! use os_image_composer::template::{merge_templates, ImageTemplate};
//!
//! let default = ImageTemplate::from_yaml_str(r#"
//! target: { os: azure-linux, dist: azl3, arch: x86_64, imageType: raw }
//! systemConfig:
//!   name: default
//!   packages: [filesystem, kernel]
//! "#).unwrap();
//! let user = ImageTemplate::from_yaml_str(r#"
//! target: { os: azure-linux, dist: azl3, arch: x86_64, imageType: raw }
//! systemConfig:
//!   packages: [kernel, curl]
//! "#).unwrap();
//!
//! let merged = merge_templates(&user, &default);
//! assert_eq!(merged.system_config.packages, ["filesystem", "kernel", "curl"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Templates (`template`)**: The build description, the vendor default
//!   lookup, and the merge of a user template over its default.
//! - **Repositories (`repo`)**: Resolution of RPM (`config.repo` and
//!   `repomd.xml`) and DEB (provider repository file) metadata into
//!   repository descriptors, behind the `Fetcher` network seam.
//! - **Packages (`package`)**: Index decoding, dependency closure, parallel
//!   download into the package cache, checksum verification, and the SPDX
//!   bill of materials.
//! - **Providers (`provider`)**: One implementation per OS family, stored in a
//!   caller-owned registry and driven through a fixed lifecycle.
//! - **Collaborators (`chroot`, `image`, `host`)**: Chroot workspace, image
//!   assembly, and host tool installation, each behind a trait.
//! - **Cache cleanup (`cache`)**: Safe removal of package caches and chroot
//!   workspaces.
//!
//! ## Execution Flow
//!
//! 1.  **Configuration**: Load the `GlobalConfig` and apply overrides.
//! 2.  **Merge**: Merge the user template over its vendor default and validate.
//! 3.  **Init**: Resolve the provider's repositories.
//! 4.  **Pre-process**: Install host tools, download and verify packages, write
//!     the bill of materials, and prepare the chroot.
//! 5.  **Build**: Hand the template to the image assembler.
//! 6.  **Post-process**: Tear down the chroot, on every exit path.

pub mod cache;
pub mod chroot;
pub mod config;
pub mod defaults;
pub mod error;
pub mod host;
pub mod image;
pub mod logging;
pub mod output;
pub mod package;
pub mod provider;
pub mod repo;
pub mod suggestions;
pub mod template;

#[cfg(test)]
mod merge_proptest;
