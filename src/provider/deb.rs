//! DEB-based providers (Ubuntu, Wind River eLxr).
//!
//! Repositories come from the provider repository file under the vendor
//! configuration tree rather than from the network.

use log::info;

use super::{BuildSteps, Provider};
use crate::error::{Error, Result};
use crate::repo::deb::{load_provider_repo_config, provider_repo_config_path, resolve_deb_repositories};
use crate::repo::RepositoryDescriptor;
use crate::template::ImageTemplate;

/// Provider backed by one or more DEB repositories.
pub struct DebProvider {
    steps: BuildSteps,
}

impl DebProvider {
    pub fn new(steps: BuildSteps) -> Self {
        Self { steps }
    }
}

impl Provider for DebProvider {
    fn name(&self) -> &str {
        self.steps.id().as_str()
    }

    fn init(&mut self) -> Result<()> {
        if !self.steps.repos.is_empty() {
            return Ok(());
        }
        let path = provider_repo_config_path(
            &self.steps.ctx.config.config_dir,
            &self.steps.os,
            &self.steps.dist,
        );
        let entries = load_provider_repo_config(&path)?;
        let repos = resolve_deb_repositories(&entries, &self.steps.arch)?;
        for (i, repo) in repos.iter().enumerate() {
            info!(
                "Repository {}: {} ({})",
                i + 1,
                repo.name,
                repo.index_location
            );
        }
        self.steps.repos = repos;
        Ok(())
    }

    fn pre_process(&mut self, template: &mut ImageTemplate) -> Result<()> {
        self.steps.pre_process(template)
    }

    fn build_image(&mut self, template: &ImageTemplate) -> Result<()> {
        self.steps.build_image(template)
    }

    fn post_process(&mut self, _template: &ImageTemplate, prior: Option<Error>) -> Result<()> {
        self.steps.post_process(prior)
    }

    fn repositories(&self) -> &[RepositoryDescriptor] {
        &self.steps.repos
    }
}
