//! Package index decoding.
//!
//! Only the fields the orchestrator needs are read: name, version,
//! architecture, location, checksums, license, origin, and the
//! requires/provides names used for dependency resolution.

use flate2::read::GzDecoder;
use log::{debug, info};
use std::io::Read;
use xot::{NameId, Node, Xot};

use super::{Checksum, PackageInfo};
use crate::error::{Error, Result};
use crate::repo::fetch::Fetcher;
use crate::repo::{join_url, RepoType, RepositoryDescriptor};

/// Decodes one repository index format.
pub trait IndexDecoder: Send + Sync {
    /// Decode an uncompressed index published by `repo`.
    fn decode(&self, data: &[u8], repo: &RepositoryDescriptor) -> Result<Vec<PackageInfo>>;
}

/// Decoder for Debian `Packages` files.
pub struct DebIndexDecoder;

/// Decoder for RPM `primary.xml` files.
pub struct RpmIndexDecoder;

/// Decompress index data according to the suffix of its location.
pub fn decompress(data: &[u8], location: &str) -> Result<Vec<u8>> {
    if location.ends_with(".gz") {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    } else if location.ends_with(".zst") {
        Ok(zstd::stream::decode_all(data)?)
    } else {
        Ok(data.to_vec())
    }
}

/// Fetch, decompress, and decode the package index of `repo`.
pub fn fetch_packages(fetcher: &dyn Fetcher, repo: &RepositoryDescriptor) -> Result<Vec<PackageInfo>> {
    let url = repo.index_url()?;
    info!("Fetching package index {}", url);
    let raw = fetcher.get(&url)?;
    let data = decompress(&raw, &url)?;
    let packages = match repo.repo_type {
        RepoType::Deb => DebIndexDecoder.decode(&data, repo)?,
        RepoType::Rpm => RpmIndexDecoder.decode(&data, repo)?,
    };
    debug!("{} packages listed by {}", packages.len(), repo.name);
    Ok(packages)
}

/// Names from a Debian relationship field, keeping the first alternative and
/// dropping version constraints and architecture qualifiers.
fn relationship_names(field: &str) -> Vec<String> {
    field
        .split(',')
        .filter_map(|clause| {
            let first = clause.split('|').next()?.trim();
            let name = first.split([' ', '(']).next()?.trim();
            let name = name.split(':').next()?.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

impl IndexDecoder for DebIndexDecoder {
    fn decode(&self, data: &[u8], repo: &RepositoryDescriptor) -> Result<Vec<PackageInfo>> {
        let text = String::from_utf8_lossy(data);
        let mut packages = Vec::new();

        for stanza in text.split("\n\n") {
            let mut fields: Vec<(String, String)> = Vec::new();
            for line in stanza.lines() {
                if line.starts_with(' ') || line.starts_with('\t') {
                    // Continuation of the previous field.
                    continue;
                }
                if let Some((key, value)) = line.split_once(':') {
                    fields.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
            let get = |key: &str| {
                fields
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("")
            };

            let name = get("Package");
            if name.is_empty() {
                continue;
            }

            let mut checksums = Vec::new();
            for (field, algorithm) in [("SHA256", "sha256"), ("SHA1", "sha1"), ("MD5sum", "md5")] {
                let value = get(field);
                if !value.is_empty() {
                    checksums.push(Checksum {
                        algorithm: algorithm.to_string(),
                        value: value.to_string(),
                    });
                }
            }

            let mut requires = relationship_names(get("Pre-Depends"));
            for dep in relationship_names(get("Depends")) {
                if !requires.contains(&dep) {
                    requires.push(dep);
                }
            }

            let filename = get("Filename");
            packages.push(PackageInfo {
                name: name.to_string(),
                pkg_type: "deb".to_string(),
                version: get("Version").to_string(),
                arch: get("Architecture").to_string(),
                url: if filename.is_empty() {
                    String::new()
                } else {
                    join_url(repo.package_base(), filename)?
                },
                description: get("Description").to_string(),
                origin: get("Maintainer").to_string(),
                license: get("License").to_string(),
                checksums,
                requires,
                provides: relationship_names(get("Provides")),
            });
        }

        Ok(packages)
    }
}

fn local_name<'a>(xot: &'a Xot, node: Node) -> Option<&'a str> {
    xot.element(node).map(|e| xot.local_name_str(e.name()))
}

fn entry_names(xot: &Xot, node: Node, name_attr: NameId) -> Vec<String> {
    xot.children(node)
        .filter(|&child| local_name(xot, child) == Some("entry"))
        .filter_map(|child| xot.get_attribute(child, name_attr).map(str::to_string))
        .collect()
}

impl IndexDecoder for RpmIndexDecoder {
    fn decode(&self, data: &[u8], repo: &RepositoryDescriptor) -> Result<Vec<PackageInfo>> {
        let text = std::str::from_utf8(data).map_err(|e| Error::Xml {
            document: repo.index_location.clone(),
            message: e.to_string(),
        })?;

        let mut xot = Xot::new();
        let root = xot.parse(text).map_err(|e| Error::Xml {
            document: repo.index_location.clone(),
            message: e.to_string(),
        })?;
        let name_attr = xot.add_name("name");
        let type_attr = xot.add_name("type");
        let ver_attr = xot.add_name("ver");
        let rel_attr = xot.add_name("rel");
        let href_attr = xot.add_name("href");

        let mut packages = Vec::new();
        for node in xot.descendants(root) {
            if local_name(&xot, node) != Some("package") {
                continue;
            }

            let mut pkg = PackageInfo {
                pkg_type: "rpm".to_string(),
                ..Default::default()
            };
            let mut href = None;

            for child in xot.children(node) {
                let text = || xot.text_content_str(child).unwrap_or("").trim().to_string();
                match local_name(&xot, child) {
                    Some("name") => pkg.name = text(),
                    Some("arch") => pkg.arch = text(),
                    Some("summary") => pkg.description = text(),
                    Some("packager") => pkg.origin = text(),
                    Some("version") => {
                        let ver = xot.get_attribute(child, ver_attr).unwrap_or("");
                        pkg.version = match xot.get_attribute(child, rel_attr) {
                            Some(rel) if !rel.is_empty() => format!("{}-{}", ver, rel),
                            _ => ver.to_string(),
                        };
                    }
                    Some("checksum") => pkg.checksums.push(Checksum {
                        algorithm: xot
                            .get_attribute(child, type_attr)
                            .unwrap_or("sha256")
                            .to_lowercase(),
                        value: text(),
                    }),
                    Some("location") => {
                        href = xot.get_attribute(child, href_attr).map(str::to_string);
                    }
                    Some("format") => {
                        for item in xot.children(child) {
                            match local_name(&xot, item) {
                                Some("license") => {
                                    pkg.license =
                                        xot.text_content_str(item).unwrap_or("").trim().to_string()
                                }
                                Some("vendor") if pkg.origin.is_empty() => {
                                    pkg.origin =
                                        xot.text_content_str(item).unwrap_or("").trim().to_string()
                                }
                                Some("requires") => {
                                    pkg.requires = entry_names(&xot, item, name_attr)
                                }
                                Some("provides") => {
                                    pkg.provides = entry_names(&xot, item, name_attr)
                                }
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }

            if pkg.name.is_empty() {
                continue;
            }
            if let Some(href) = href {
                pkg.url = join_url(&repo.base_url, &href)?;
            }
            packages.push(pkg);
        }

        Ok(packages)
    }
}
