//! Package selection and dependency resolution.
//!
//! When several repositories list the same package, the entry listed last
//! wins, so repositories added later (for example from a template's
//! `packageRepositories`) override the vendor repositories.

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::PackageInfo;
use crate::error::{Error, Result};

/// Lookup tables over the packages of one or more indices.
struct PackageIndex<'a> {
    by_name: HashMap<&'a str, &'a PackageInfo>,
    by_provide: HashMap<&'a str, &'a PackageInfo>,
}

impl<'a> PackageIndex<'a> {
    fn new(available: &'a [PackageInfo]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_provide = HashMap::new();
        for pkg in available {
            by_name.insert(pkg.name.as_str(), pkg);
            for provided in &pkg.provides {
                by_provide.insert(provided.as_str(), pkg);
            }
        }
        Self {
            by_name,
            by_provide,
        }
    }

    fn lookup(&self, name: &str) -> Option<&'a PackageInfo> {
        self.by_name
            .get(name)
            .or_else(|| self.by_provide.get(name))
            .copied()
    }
}

/// Select the package for each requested name.
///
/// Fails with every unknown name listed, sorted.
pub fn match_requested(names: &[String], available: &[PackageInfo]) -> Result<Vec<PackageInfo>> {
    let index = PackageIndex::new(available);
    let mut selected = Vec::new();
    let mut seen = HashSet::new();
    let mut missing = Vec::new();

    for name in names {
        match index.lookup(name) {
            Some(pkg) => {
                if seen.insert(pkg.name.as_str()) {
                    selected.push(pkg.clone());
                }
            }
            None => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(Error::PackageNotFound { names: missing });
    }
    Ok(selected)
}

fn is_ignored_requirement(name: &str) -> bool {
    name.starts_with("rpmlib(") || name.starts_with('/')
}

/// The transitive closure of `requested` over `requires`, sorted by name.
///
/// Requirements that no package satisfies are logged and skipped.
pub fn resolve_dependencies(requested: &[PackageInfo], available: &[PackageInfo]) -> Vec<PackageInfo> {
    let index = PackageIndex::new(available);
    let mut resolved: BTreeMap<String, PackageInfo> = BTreeMap::new();
    let mut queue: VecDeque<PackageInfo> = requested.iter().cloned().collect();

    while let Some(pkg) = queue.pop_front() {
        if resolved.contains_key(&pkg.name) {
            continue;
        }
        for requirement in &pkg.requires {
            if is_ignored_requirement(requirement) {
                continue;
            }
            match index.lookup(requirement) {
                Some(dep) if !resolved.contains_key(&dep.name) => queue.push_back(dep.clone()),
                Some(_) => {}
                None => debug!("{}: no package provides '{}'", pkg.name, requirement),
            }
        }
        resolved.insert(pkg.name.clone(), pkg);
    }

    resolved.into_values().collect()
}
