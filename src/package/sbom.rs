//! SPDX 2.3 bill of materials for the packages of a build.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::PackageInfo;
use crate::defaults::TOOL_NAME;
use crate::error::Result;
use crate::repo::RepoType;

const NOASSERTION: &str = "NOASSERTION";
const INCLUDED_CHECKSUMS: [&str; 3] = ["SHA1", "SHA256", "MD5"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdxDocument {
    pub spdx_version: String,
    pub data_license: String,
    #[serde(rename = "SPDXID")]
    pub spdx_id: String,
    pub name: String,
    pub document_namespace: String,
    pub creation_info: CreationInfo,
    pub packages: Vec<SpdxPackage>,
}

#[derive(Debug, Serialize)]
pub struct CreationInfo {
    pub created: String,
    pub creators: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    pub spdx_id: String,
    pub name: String,
    pub version_info: String,
    pub supplier: String,
    pub download_location: String,
    pub files_analyzed: bool,
    pub license_concluded: String,
    pub license_declared: String,
    pub checksums: Vec<SpdxChecksum>,
}

#[derive(Debug, Serialize)]
pub struct SpdxChecksum {
    pub algorithm: String,
    #[serde(rename = "checksumValue")]
    pub checksum_value: String,
}

/// Replace everything outside `[A-Za-z0-9.-]` with `-`.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn or_noassertion(value: &str) -> String {
    if value.trim().is_empty() {
        NOASSERTION.to_string()
    } else {
        value.trim().to_string()
    }
}

/// SPDX supplier field for a package origin.
fn supplier(origin: &str) -> String {
    let origin = origin.trim();
    if origin.is_empty() {
        return NOASSERTION.to_string();
    }
    if let (Some(open), true) = (origin.find('<'), origin.ends_with('>')) {
        let name = origin[..open].trim();
        let email = &origin[open + 1..origin.len() - 1];
        if !name.is_empty() && !email.is_empty() {
            return format!("Person: {} ({})", name, email.trim());
        }
    }
    format!("Organization: {}", origin)
}

fn spdx_package(pkg: &PackageInfo) -> SpdxPackage {
    let license = or_noassertion(&pkg.license);
    SpdxPackage {
        spdx_id: format!("SPDXRef-Package-{}", sanitize(&pkg.name)),
        name: pkg.name.clone(),
        version_info: pkg.version.clone(),
        supplier: supplier(&pkg.origin),
        download_location: or_noassertion(&pkg.url),
        files_analyzed: false,
        license_concluded: license.clone(),
        license_declared: license,
        checksums: pkg
            .checksums
            .iter()
            .filter_map(|c| {
                let algorithm = c.algorithm.to_uppercase();
                INCLUDED_CHECKSUMS
                    .contains(&algorithm.as_str())
                    .then(|| SpdxChecksum {
                        algorithm,
                        checksum_value: c.value.clone(),
                    })
            })
            .collect(),
    }
}

/// Build the SPDX document for `packages`.
pub fn build_document(packages: &[PackageInfo], name: &str, created: DateTime<Utc>) -> SpdxDocument {
    SpdxDocument {
        spdx_version: "SPDX-2.3".to_string(),
        data_license: "CC0-1.0".to_string(),
        spdx_id: "SPDXRef-DOCUMENT".to_string(),
        name: name.to_string(),
        document_namespace: format!(
            "https://spdx.openedge.dev/docs/{}-{}",
            TOOL_NAME,
            Uuid::new_v4()
        ),
        creation_info: CreationInfo {
            created: created.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            creators: vec![format!("Tool: {}", TOOL_NAME)],
        },
        packages: packages.iter().map(spdx_package).collect(),
    }
}

/// Write the bill of materials for `packages` into `temp_dir`.
///
/// Returns the path of the written manifest.
pub fn write_sbom(
    packages: &[PackageInfo],
    repo_type: RepoType,
    repo_name: &str,
    temp_dir: &Path,
) -> Result<PathBuf> {
    let now = Utc::now();
    let file_name = format!(
        "spdx_manifest_{}_{}_{}.json",
        repo_type,
        sanitize(repo_name),
        now.format("%Y%m%d_%H%M%S")
    );
    let document = build_document(packages, &file_name, now);

    fs::create_dir_all(temp_dir)?;
    let path = temp_dir.join(file_name);
    fs::write(&path, serde_json::to_string_pretty(&document)?)?;
    info!(
        "Wrote SPDX manifest for {} packages to {}",
        packages.len(),
        path.display()
    );
    Ok(path)
}
