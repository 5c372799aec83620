//! RPM-based providers (Azure Linux, Edge Microvisor Toolkit).

use log::info;

use super::{BuildSteps, Provider, EDGE_CONFIG_URL, EDGE_GPG_KEY_URL, EDGE_REPOMD_URL};
use crate::error::{Error, Result};
use crate::repo::rpm::{resolve_rpm_repository, RpmRepoSource};
use crate::repo::RepositoryDescriptor;
use crate::template::ImageTemplate;

/// Provider backed by a single RPM repository.
pub struct RpmProvider {
    steps: BuildSteps,
    source: RpmRepoSource,
}

impl RpmProvider {
    /// A provider whose repository follows the `<base>/<arch>/` layout.
    pub fn standard(steps: BuildSteps, base_url: &str) -> Self {
        let source = RpmRepoSource::standard(base_url, &steps.arch);
        Self::with_source(steps, source)
    }

    /// The Edge Microvisor Toolkit provider.
    pub fn edge(steps: BuildSteps) -> Self {
        let source = RpmRepoSource::fixed(EDGE_CONFIG_URL, EDGE_REPOMD_URL, Some(EDGE_GPG_KEY_URL));
        Self::with_source(steps, source)
    }

    pub fn with_source(steps: BuildSteps, source: RpmRepoSource) -> Self {
        Self { steps, source }
    }
}

impl Provider for RpmProvider {
    fn name(&self) -> &str {
        self.steps.id().as_str()
    }

    fn init(&mut self) -> Result<()> {
        if !self.steps.repos.is_empty() {
            return Ok(());
        }
        let repo = resolve_rpm_repository(
            self.steps.ctx.fetcher.as_ref(),
            &self.source,
            &self.steps.arch,
        )?;
        info!(
            "Provider {} uses repository {} ({})",
            self.name(),
            repo.name,
            repo.base_url
        );
        self.steps.repos = vec![repo];
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
