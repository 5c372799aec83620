//! # OS Providers
//!
//! A provider encapsulates one OS vendor's build logic: where its packages
//! come from, which host tools it needs, and how its images are assembled.
//!
//! ## Design
//!
//! - [`ProviderKind`] is the closed set of provider families. It maps a
//!   template's `target.os` to a family and constructs the concrete
//!   [`Provider`].
//! - [`ProviderRegistry`] stores constructed providers under their
//!   [`ProviderId`]. The registry is owned by whoever drives the build.
//! - [`BuildContext`] carries the global configuration and the collaborators
//!   (network, host tools, chroot, assembler) a provider calls. Every
//!   collaborator is a trait object so tests can substitute mocks.
//! - [`lifecycle`] enforces the stage order and guarantees `post_process`.
//!
//! The RPM ([`rpm`]) and DEB ([`deb`]) variants differ in how `init` resolves
//! repositories. Everything after that is shared through [`BuildSteps`].

pub mod deb;
pub mod lifecycle;
pub mod rpm;

use log::{info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::chroot::{ChrootManager, WorkspaceChroot};
use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::host::{ensure_host_dependencies, HostTools, SystemHostTools};
use crate::image::{ExternalAssembler, ImageAssembler};
use crate::package::download::Downloader;
use crate::package::index::fetch_packages;
use crate::package::resolve::{match_requested, resolve_dependencies};
use crate::package::sbom::write_sbom;
use crate::package::verify::verify_packages;
use crate::package::PackageInfo;
use crate::repo::deb::user_deb_repository;
use crate::repo::fetch::{Fetcher, HttpFetcher};
use crate::repo::rpm::resolve_user_rpm_repository;
use crate::repo::{RepoType, RepositoryDescriptor};
use crate::template::{ImageTemplate, ImageType};

pub use deb::DebProvider;
pub use lifecycle::{run_build, Lifecycle, LifecycleState};
pub use rpm::RpmProvider;

/// The capability set every OS provider implements.
pub trait Provider {
    /// The provider's registry key.
    fn name(&self) -> &str;

    /// Resolve repository descriptors. Calling it again is a no-op.
    fn init(&mut self) -> Result<()>;

    /// Install host tools, download packages, and prepare the chroot.
    fn pre_process(&mut self, template: &mut ImageTemplate) -> Result<()>;

    /// Assemble the image type named by the template.
    fn build_image(&mut self, template: &ImageTemplate) -> Result<()>;

    /// Tear down the chroot, returning `prior` if it is set.
    fn post_process(&mut self, template: &ImageTemplate, prior: Option<Error>) -> Result<()>;

    /// Repositories resolved by `init`.
    fn repositories(&self) -> &[RepositoryDescriptor];
}

static PROVIDER_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("provider id pattern is valid"));

/// `<os>-<dist>-<arch>`, the key of a provider in the registry and in the
/// cache and work directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(os: &str, dist: &str, arch: &str) -> Result<Self> {
        Self::parse(&format!("{}-{}-{}", os, dist, arch))
    }

    /// Validate an existing identifier.
    pub fn parse(id: &str) -> Result<Self> {
        if !PROVIDER_ID_PATTERN.is_match(id) || id == "." || id == ".." {
            return Err(Error::ConfigValidation {
                field: "provider id".to_string(),
                message: format!(
                    "'{}' must contain only letters, digits, '.', '_' and '-'",
                    id
                ),
            });
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RPM base repository for Azure Linux 3.0.
pub const AZURE_LINUX_BASE_URL: &str = "https://packages.microsoft.com/azurelinux/3.0/prod/base/";
/// Edge Microvisor Toolkit repository description.
pub const EDGE_CONFIG_URL: &str = "https://raw.githubusercontent.com/open-edge-platform/edge-microvisor-toolkit/refs/heads/3.0/SPECS/edge-repos/edge-base.repo";
/// Edge Microvisor Toolkit repository manifest.
pub const EDGE_REPOMD_URL: &str =
    "https://files-rs.edgeorchestration.intel.com/files-edge-orch/microvisor/rpm/3.0/repodata/repomd.xml";
/// Edge Microvisor Toolkit signing key.
pub const EDGE_GPG_KEY_URL: &str = "https://raw.githubusercontent.com/open-edge-platform/edge-microvisor-toolkit/refs/heads/3.0/SPECS/edge-repos/INTEL-RPM-GPG-KEY";

/// Provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// RPM distribution with one standard repository (Azure Linux).
    RpmSingle,
    /// RPM distribution with fixed repository URLs (Edge Microvisor Toolkit).
    RpmEdge,
    /// DEB distribution with repositories listed in its provider config.
    DebMulti,
}

/// Operating systems with a provider.
pub const SUPPORTED_OS: [&str; 4] = [
    "azure-linux",
    "edge-microvisor-toolkit",
    "ubuntu",
    "wind-river-elxr",
];

impl ProviderKind {
    pub fn for_os(os: &str) -> Result<Self> {
        match os {
            "azure-linux" => Ok(ProviderKind::RpmSingle),
            "edge-microvisor-toolkit" => Ok(ProviderKind::RpmEdge),
            "ubuntu" | "wind-river-elxr" => Ok(ProviderKind::DebMulti),
            other => Err(Error::UnsupportedOs {
                os: other.to_string(),
                supported: SUPPORTED_OS.join(", "),
            }),
        }
    }

    pub fn repo_type(&self) -> RepoType {
        match self {
            ProviderKind::RpmSingle | ProviderKind::RpmEdge => RepoType::Rpm,
            ProviderKind::DebMulti => RepoType::Deb,
        }
    }

    /// Construct the provider for `os`/`dist`/`arch`.
    pub fn build(self, os: &str, dist: &str, arch: &str, ctx: BuildContext) -> Result<Box<dyn Provider>> {
        let steps = BuildSteps::new(os, dist, arch, self.repo_type(), ctx)?;
        Ok(match self {
            ProviderKind::RpmSingle => Box::new(RpmProvider::standard(steps, AZURE_LINUX_BASE_URL)),
            ProviderKind::RpmEdge => Box::new(RpmProvider::edge(steps)),
            ProviderKind::DebMulti => Box::new(DebProvider::new(steps)),
        })
    }
}

/// Configuration and collaborators shared by a provider's stages.
#[derive(Clone)]
pub struct BuildContext {
    pub config: Arc<GlobalConfig>,
    pub fetcher: Arc<dyn Fetcher>,
    pub host: Arc<dyn HostTools>,
    pub chroot: Arc<dyn ChrootManager>,
    pub assembler: Arc<dyn ImageAssembler>,
    /// Show download progress bars.
    pub show_progress: bool,
}

impl BuildContext {
    /// A context with the default collaborators.
    pub fn new(config: Arc<GlobalConfig>) -> Result<Self> {
        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new()?),
            host: Arc::new(SystemHostTools),
            chroot: Arc::new(WorkspaceChroot::new(&config.work_dir)),
            assembler: Arc::new(ExternalAssembler::new(&config.work_dir)),
            show_progress: true,
            config,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostTools>) -> Self {
        self.host = host;
        self
    }

    pub fn with_chroot(mut self, chroot: Arc<dyn ChrootManager>) -> Self {
        self.chroot = chroot;
        self
    }

    pub fn with_assembler(mut self, assembler: Arc<dyn ImageAssembler>) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Stage implementations shared by every provider family.
pub struct BuildSteps {
    id: ProviderId,
    os: String,
    dist: String,
    arch: String,
    repo_type: RepoType,
    ctx: BuildContext,
    repos: Vec<RepositoryDescriptor>,
}

impl BuildSteps {
    pub fn new(os: &str, dist: &str, arch: &str, repo_type: RepoType, ctx: BuildContext) -> Result<Self> {
        Ok(Self {
            id: ProviderId::new(os, dist, arch)?,
            os: os.to_string(),
            dist: dist.to_string(),
            arch: arch.to_string(),
            repo_type,
            ctx,
            repos: Vec::new(),
        })
    }

    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    fn host_dependencies(&self) -> &'static [(&'static str, &'static str)] {
        match self.repo_type {
            RepoType::Rpm => crate::host::RPM_HOST_DEPENDENCIES,
            RepoType::Deb => crate::host::DEB_HOST_DEPENDENCIES,
        }
    }

    /// Extra repositories listed in the template.
    fn template_repositories(&self, template: &ImageTemplate) -> Result<Vec<RepositoryDescriptor>> {
        template
            .package_repositories
            .iter()
            .filter(|repo| !repo.url.is_empty())
            .map(|repo| match self.repo_type {
                RepoType::Deb => Ok(user_deb_repository(repo, &self.arch)),
                RepoType::Rpm => resolve_user_rpm_repository(self.ctx.fetcher.as_ref(), repo),
            })
            .collect()
    }

    /// Resolve, download, and verify the packages `template` asks for.
    pub fn download_packages(&self, template: &ImageTemplate) -> Result<Vec<PackageInfo>> {
        let mut repos: Vec<RepositoryDescriptor> = self.repos.clone();
        repos.extend(self.template_repositories(template)?);
        if repos.is_empty() {
            return Err(Error::NoRepositories);
        }

        let mut available = Vec::new();
        for repo in repos.iter().filter(|r| r.enabled) {
            available.extend(fetch_packages(self.ctx.fetcher.as_ref(), repo)?);
        }

        let requested = match_requested(template.packages(), &available)?;
        let packages = resolve_dependencies(&requested, &available);
        info!(
            "{} requested packages resolve to {} packages",
            requested.len(),
            packages.len()
        );

        let config = &self.ctx.config;
        let cache_dir = config.pkg_cache_dir(self.id.as_str());
        Downloader::new(self.ctx.fetcher.clone(), config.workers)
            .with_progress(self.ctx.show_progress)
            .download_packages(&packages, &cache_dir)?;
        verify_packages(&packages, &cache_dir, config.verification_workers())?;
        Ok(packages)
    }

    pub fn pre_process(&self, template: &mut ImageTemplate) -> Result<()> {
        let installed = ensure_host_dependencies(self.ctx.host.as_ref(), self.host_dependencies())?;
        if !installed.is_empty() {
            info!("Installed host packages: {}", installed.join(", "));
        }

        self.ctx.chroot.update_system_pkgs(template)?;
        let packages = self.download_packages(template)?;

        if self.repo_type == RepoType::Deb {
            let repo_name = self.repos.first().map(|r| r.name.as_str()).unwrap_or(self.id.as_str());
            write_sbom(&packages, self.repo_type, repo_name, &self.ctx.config.temp_dir)?;
        }

        self.ctx
            .chroot
            .init_chroot_env(&self.os, &self.dist, &self.arch)
    }

    pub fn build_image(&self, template: &ImageTemplate) -> Result<()> {
        let image_type = ImageType::parse(&template.target.image_type)?;
        info!("Building {} image {}", image_type, template.image.name);

        let assembler = &self.ctx.assembler;
        match image_type {
            ImageType::Raw => assembler.build_raw_image(template),
            ImageType::Img => assembler.build_initrd_image(template),
            ImageType::Iso => assembler.build_iso_image(template),
        }
    }

    pub fn post_process(&self, prior: Option<Error>) -> Result<()> {
        let cleanup = self
            .ctx
            .chroot
            .cleanup_chroot_env(&self.os, &self.dist, &self.arch);

        match (prior, cleanup) {
            (None, Ok(())) => Ok(()),
            (Some(original), Ok(())) => Err(original),
            (None, Err(cleanup)) => Err(cleanup),
            (Some(original), Err(cleanup)) => {
                warn!("Chroot cleanup failed after an earlier error: {}", cleanup);
                Err(Error::CleanupAfterFailure {
                    original: Box::new(original),
                    cleanup: Box::new(cleanup),
                })
            }
        }
    }
}

/// Providers of one build, keyed by [`ProviderId`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `provider` under its name, replacing any provider with that name.
    pub fn register(&mut self, provider: Box<dyn Provider>) -> ProviderId {
        let id = ProviderId(provider.name().to_string());
        self.providers.insert(id.0.clone(), provider);
        id
    }

    /// Construct and store the provider of `kind` for a target.
    pub fn register_target(
        &mut self,
        kind: ProviderKind,
        os: &str,
        dist: &str,
        arch: &str,
        ctx: BuildContext,
    ) -> Result<ProviderId> {
        let provider = kind.build(os, dist, arch, ctx)?;
        Ok(self.register(provider))
    }

    pub fn get(&self, id: &str) -> Option<&dyn Provider> {
        self.providers.get(id).map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn Provider + 'static)> {
        self.providers.get_mut(id).map(|p| p.as_mut())
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::host::testing::MockHostTools;
    use crate::repo::fetch::testing::MockFetcher;
    use std::sync::Mutex;

    /// Records chroot calls; optionally fails cleanup.
    #[derive(Default)]
    pub struct MockChroot {
        pub calls: Mutex<Vec<String>>,
        pub fail_cleanup: bool,
    }

    impl MockChroot {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn record(&self, call: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }
    }

    impl ChrootManager for MockChroot {
        fn init_chroot_env(&self, os: &str, dist: &str, arch: &str) -> Result<()> {
            self.record(format!("init {}-{}-{}", os, dist, arch));
            Ok(())
        }

        fn cleanup_chroot_env(&self, os: &str, dist: &str, arch: &str) -> Result<()> {
            self.record(format!("cleanup {}-{}-{}", os, dist, arch));
            if self.fail_cleanup {
                return Err(Error::Chroot {
                    operation: "cleanup".to_string(),
                    message: "device busy".to_string(),
                });
            }
            Ok(())
        }

        fn update_system_pkgs(&self, template: &mut ImageTemplate) -> Result<()> {
            self.record("update".to_string());
            template.kernel_packages = template.system_config.kernel.packages.clone();
            template.refresh_full_packages();
            Ok(())
        }
    }

    /// Records which image builder was called.
    #[derive(Default)]
    pub struct MockAssembler {
        pub built: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl MockAssembler {
        pub fn built(&self) -> Vec<String> {
            self.built.lock().map(|b| b.clone()).unwrap_or_default()
        }

        fn record(&self, kind: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Build {
                    image_type: kind.to_string(),
                    message: "assembler failed".to_string(),
                });
            }
            if let Ok(mut built) = self.built.lock() {
                built.push(kind.to_string());
            }
            Ok(())
        }
    }

    impl ImageAssembler for MockAssembler {
        fn build_raw_image(&self, _template: &ImageTemplate) -> Result<()> {
            self.record("raw")
        }

        fn build_iso_image(&self, _template: &ImageTemplate) -> Result<()> {
            self.record("iso")
        }

        fn build_initrd_image(&self, _template: &ImageTemplate) -> Result<()> {
            self.record("initrd")
        }
    }

    /// A context with all-mock collaborators and every host tool present.
    pub fn mock_context(
        config: GlobalConfig,
        fetcher: MockFetcher,
    ) -> (BuildContext, Arc<MockChroot>, Arc<MockAssembler>) {
        let mut commands: Vec<&str> = crate::host::DEB_HOST_DEPENDENCIES
            .iter()
            .map(|(c, _)| *c)
            .collect();
        commands.extend(crate::host::RPM_HOST_DEPENDENCIES.iter().map(|(c, _)| *c));
        let chroot = Arc::new(MockChroot::default());
        let assembler = Arc::new(MockAssembler::default());
        let ctx = BuildContext {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            host: Arc::new(MockHostTools::with_commands(&commands)),
            chroot: chroot.clone(),
            assembler: assembler.clone(),
            show_progress: false,
        };
        (ctx, chroot, assembler)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::repo::fetch::testing::MockFetcher;

    fn steps(kind: ProviderKind) -> (BuildSteps, Arc<MockChroot>, Arc<MockAssembler>) {
        let (ctx, chroot, assembler) = mock_context(GlobalConfig::default(), MockFetcher::new());
        let steps = BuildSteps::new("ubuntu", "ubuntu24", "x86_64", kind.repo_type(), ctx).unwrap();
        (steps, chroot, assembler)
    }

    #[test]
    fn test_provider_kind_for_os() {
        assert_eq!(ProviderKind::for_os("azure-linux").unwrap(), ProviderKind::RpmSingle);
        assert_eq!(
            ProviderKind::for_os("edge-microvisor-toolkit").unwrap(),
            ProviderKind::RpmEdge
        );
        assert_eq!(ProviderKind::for_os("ubuntu").unwrap(), ProviderKind::DebMulti);
        assert_eq!(ProviderKind::for_os("wind-river-elxr").unwrap(), ProviderKind::DebMulti);

        let err = ProviderKind::for_os("gentoo").unwrap_err();
        assert!(matches!(err, Error::UnsupportedOs { .. }));
        assert!(err.to_string().contains("ubuntu"));
    }

    #[test]
    fn test_provider_id_validation() {
        assert_eq!(
            ProviderId::new("ubuntu", "ubuntu24", "x86_64").unwrap().as_str(),
            "ubuntu-ubuntu24-x86_64"
        );
        assert!(ProviderId::parse("..").is_err());
        assert!(ProviderId::parse(".").is_err());
        assert!(ProviderId::new("ubuntu", "../etc", "x86_64").is_err());
        assert!(ProviderId::new("ubuntu", "ubuntu 24", "x86_64").is_err());
        assert!(ProviderId::parse("").is_err());
        for _ in 0..3 {
            assert!(ProviderId::parse("azure-linux-azl3-x86_64").is_ok());
            assert!(ProviderId::parse("a/b").is_err());
        }
    }

    #[test]
    fn test_build_image_dispatch() {
        let (steps, _, assembler) = steps(ProviderKind::DebMulti);
        let mut template = ImageTemplate::default();
        for image_type in ["raw", "img", "iso"] {
            template.target.image_type = image_type.into();
            steps.build_image(&template).unwrap();
        }
        assert_eq!(assembler.built(), vec!["raw", "initrd", "iso"]);
    }

    #[test]
    fn test_build_image_unsupported_type() {
        let (steps, _, assembler) = steps(ProviderKind::DebMulti);
        let mut template = ImageTemplate::default();
        template.target.image_type = "vhd".into();
        let err = steps.build_image(&template).unwrap_err();
        assert_eq!(err.to_string(), "unsupported image type: vhd");
        assert!(assembler.built().is_empty());
    }

    #[test]
    fn test_post_process_outcomes() {
        let (steps, chroot, _) = steps(ProviderKind::DebMulti);
        assert!(steps.post_process(None).is_ok());

        let err = steps
            .post_process(Some(Error::Download {
                package: "curl".into(),
                message: "timeout".into(),
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Download { .. }));
        assert_eq!(chroot.calls().len(), 2);
    }

    #[test]
    fn test_post_process_cleanup_failure_keeps_original() {
        let (ctx, _, _) = mock_context(GlobalConfig::default(), MockFetcher::new());
        let chroot = Arc::new(MockChroot {
            fail_cleanup: true,
            ..Default::default()
        });
        let ctx = ctx.with_chroot(chroot);
        let steps = BuildSteps::new("ubuntu", "ubuntu24", "x86_64", RepoType::Deb, ctx).unwrap();

        let err = steps.post_process(None).unwrap_err();
        assert!(matches!(err, Error::Chroot { .. }));

        let err = steps
            .post_process(Some(Error::PackageNotFound {
                names: vec!["zsh".into()],
            }))
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Packages not found in any repository: zsh"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Packages not found in any repository: zsh");
    }

    #[test]
    fn test_no_repositories() {
        let (steps, _, _) = steps(ProviderKind::DebMulti);
        let err = steps.download_packages(&ImageTemplate::default()).unwrap_err();
        assert!(matches!(err, Error::NoRepositories));
    }

    #[test]
    fn test_registry() {
        let (ctx, _, _) = mock_context(GlobalConfig::default(), MockFetcher::new());
        let mut registry = ProviderRegistry::new();
        let id = registry
            .register_target(ProviderKind::DebMulti, "ubuntu", "ubuntu24", "x86_64", ctx.clone())
            .unwrap();
        registry
            .register_target(ProviderKind::RpmSingle, "azure-linux", "azl3", "x86_64", ctx)
            .unwrap();

        assert_eq!(id.as_str(), "ubuntu-ubuntu24-x86_64");
        assert_eq!(
            registry.ids(),
            vec!["azure-linux-azl3-x86_64", "ubuntu-ubuntu24-x86_64"]
        );
        assert_eq!(
            registry.get("azure-linux-azl3-x86_64").unwrap().name(),
            "azure-linux-azl3-x86_64"
        );
        assert!(registry.get_mut("ubuntu-ubuntu24-x86_64").is_some());
        assert!(registry.get("fedora-f40-x86_64").is_none());
    }
}
