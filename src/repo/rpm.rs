//! RPM repository resolution.
//!
//! An RPM repository publishes a `config.repo` file describing itself and a
//! `repodata/repomd.xml` manifest whose `<data type="primary">` entry locates
//! the primary package index.

use ini::Ini;
use log::{debug, info};
use xot::{Node, Xot};

use super::fetch::Fetcher;
use super::{is_absolute_url, join_url, RepoType, RepositoryDescriptor};
use crate::error::{Error, Result};
use crate::template::PackageRepository;

/// Where to find a repository's `config.repo` and `repomd.xml`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpmRepoSource {
    pub config_url: String,
    pub repomd_url: String,
    /// Base URL used when `config.repo` has no `baseurl`.
    pub fallback_base: String,
    /// GPG key that replaces the one named in `config.repo`.
    pub gpg_key_override: Option<String>,
}

impl RpmRepoSource {
    /// A repository laid out as `<base>/<arch>/{config.repo,repodata/repomd.xml}`.
    pub fn standard(base_url: &str, arch: &str) -> Self {
        let base = format!("{}/{}/", base_url.trim_end_matches('/'), arch);
        Self {
            config_url: format!("{}config.repo", base),
            repomd_url: format!("{}repodata/repomd.xml", base),
            fallback_base: base,
            gpg_key_override: None,
        }
    }

    /// A repository whose documents live at fixed URLs.
    pub fn fixed(config_url: &str, repomd_url: &str, gpg_key_url: Option<&str>) -> Self {
        let fallback_base = repomd_url
            .strip_suffix("repodata/repomd.xml")
            .unwrap_or(repomd_url)
            .to_string();
        Self {
            config_url: config_url.to_string(),
            repomd_url: repomd_url.to_string(),
            fallback_base,
            gpg_key_override: gpg_key_url.map(str::to_string),
        }
    }
}

/// Settings read from a `config.repo` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoConfig {
    pub section: String,
    pub name: String,
    pub base_url: String,
    pub gpg_check: bool,
    pub repo_gpg_check: bool,
    pub enabled: bool,
    pub gpg_key: String,
}

const REPO_KEYS: [&str; 6] = [
    "name",
    "baseurl",
    "gpgcheck",
    "repo_gpgcheck",
    "enabled",
    "gpgkey",
];

/// Parse a `config.repo` document.
///
/// The first section that sets any known key wins. Boolean keys are true only
/// when their value is `1`, except that a missing `enabled` means enabled.
pub fn parse_repo_config(text: &str) -> Result<RepoConfig> {
    let ini = Ini::load_from_str(text)?;

    for (section, props) in ini.iter() {
        if !REPO_KEYS.iter().any(|k| props.contains_key(k)) {
            continue;
        }
        let get = |key: &str| props.get(key).unwrap_or("").trim().to_string();
        let flag_or = |key: &str, absent: bool| props.get(key).map(|v| v.trim() == "1").unwrap_or(absent);
        let flag = |key: &str| flag_or(key, false);

        return Ok(RepoConfig {
            section: section.unwrap_or("").to_string(),
            name: get("name"),
            base_url: get("baseurl"),
            gpg_check: flag("gpgcheck"),
            repo_gpg_check: flag("repo_gpgcheck"),
            enabled: flag_or("enabled", true),
            gpg_key: get("gpgkey"),
        });
    }

    Err(Error::Resolution {
        repo: "config.repo".to_string(),
        message: "no repository section found".to_string(),
    })
}

fn is_element(xot: &Xot, node: Node, local_name: &str) -> bool {
    xot.element(node)
        .map(|element| xot.local_name_str(element.name()) == local_name)
        .unwrap_or(false)
}

/// Find the href of the primary index in a `repomd.xml` document.
///
/// `url` names the document in errors.
pub fn find_primary_location(xml: &str, url: &str) -> Result<String> {
    let mut xot = Xot::new();
    let root = xot.parse(xml).map_err(|e| Error::Xml {
        document: url.to_string(),
        message: e.to_string(),
    })?;
    let type_attr = xot.add_name("type");
    let href_attr = xot.add_name("href");

    for node in xot.descendants(root) {
        if !is_element(&xot, node, "data") || xot.get_attribute(node, type_attr) != Some("primary")
        {
            continue;
        }
        for child in xot.children(node) {
            if !is_element(&xot, child, "location") {
                continue;
            }
            if let Some(href) = xot.get_attribute(child, href_attr) {
                return Ok(href.to_string());
            }
        }
    }

    Err(Error::PrimaryLocationNotFound {
        url: url.to_string(),
    })
}

fn fetch_text(fetcher: &dyn Fetcher, url: &str) -> Result<String> {
    let bytes = fetcher.get(url)?;
    String::from_utf8(bytes).map_err(|e| Error::Resolution {
        repo: url.to_string(),
        message: format!("response is not UTF-8: {}", e),
    })
}

/// Resolve an RPM repository for `arch` from its `config.repo` and `repomd.xml`.
pub fn resolve_rpm_repository(
    fetcher: &dyn Fetcher,
    source: &RpmRepoSource,
    arch: &str,
) -> Result<RepositoryDescriptor> {
    info!("Fetching repository config {}", source.config_url);
    let config = parse_repo_config(&fetch_text(fetcher, &source.config_url)?)?;

    let base_url = if config.base_url.is_empty() {
        source.fallback_base.clone()
    } else {
        config.base_url.replace("$basearch", arch)
    };

    let repomd = fetch_text(fetcher, &source.repomd_url)?;
    let index_location = find_primary_location(&repomd, &source.repomd_url)?;
    debug!("Primary index for {}: {}", config.name, index_location);

    let gpg_key = source
        .gpg_key_override
        .clone()
        .unwrap_or_else(|| config.gpg_key.clone());
    let gpg_key_url = resolve_gpg_key(&base_url, &gpg_key)?;

    Ok(RepositoryDescriptor {
        repo_type: RepoType::Rpm,
        name: if config.name.is_empty() {
            config.section.clone()
        } else {
            config.name.clone()
        },
        base_url,
        index_location,
        gpg_key_url,
        component: config.section,
        enabled: config.enabled,
        gpg_check: config.gpg_check,
        repo_gpg_check: config.repo_gpg_check,
        pkg_prefix: String::new(),
        build_path: String::new(),
    })
}

/// Resolve an extra RPM repository supplied by a template.
pub fn resolve_user_rpm_repository(
    fetcher: &dyn Fetcher,
    repo: &PackageRepository,
) -> Result<RepositoryDescriptor> {
    let repomd_url = join_url(&repo.url, "repodata/repomd.xml")?;
    let repomd = fetch_text(fetcher, &repomd_url)?;
    let index_location = find_primary_location(&repomd, &repomd_url)?;

    Ok(RepositoryDescriptor {
        repo_type: RepoType::Rpm,
        name: repo.codename.clone(),
        base_url: repo.url.clone(),
        index_location,
        gpg_key_url: resolve_gpg_key(&repo.url, &repo.pkey)?,
        component: repo.component.clone(),
        enabled: true,
        gpg_check: !repo.pkey.is_empty(),
        repo_gpg_check: false,
        pkg_prefix: String::new(),
        build_path: String::new(),
    })
}

/// Make a GPG key location absolute by joining it to the repository base URL.
pub fn resolve_gpg_key(base_url: &str, key: &str) -> Result<String> {
    if key.is_empty() || is_absolute_url(key) {
        return Ok(key.to_string());
    }
    join_url(base_url, key)
}
