//! Build command implementation
//!
//! The build command runs the whole pipeline for one template:
//! 1. Load the global config and apply command-line overrides
//! 2. Merge the template over its vendor default and validate the result
//! 3. Register the provider for the template's target
//! 4. Drive init, pre-process, build, and post-process
//!
//! With `--dry-run` the command stops after step 2 and prints the merged
//! template.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use os_image_composer::config::{ConfigOverrides, GlobalConfig};
use os_image_composer::provider::{run_build, BuildContext, ProviderKind, ProviderRegistry};
use os_image_composer::suggestions;
use os_image_composer::template::defaults::load_and_merge;
use os_image_composer::template::{validate_template, ImageTemplate, ValidationScope};

use crate::cli::GlobalArgs;

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Image template to build
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// Number of concurrent package downloads
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Package cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Chroot workspace directory
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Merge and validate the template, print it, and stop
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Load, merge, and fully validate a template.
pub fn load_template(path: &Path, config: &GlobalConfig) -> Result<ImageTemplate> {
    if !path.is_file() {
        return Err(suggestions::template_not_found(path));
    }
    let template = load_and_merge(path, config).map_err(suggestions::explain)?;
    validate_template(
        &template,
        ValidationScope::Full,
        &format!("merged {}", path.display()),
    )
    .map_err(suggestions::explain)?;
    Ok(template)
}

/// Execute the build command
pub fn execute(args: BuildArgs, globals: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let out = &globals.out;

    let config = globals.load_config(ConfigOverrides {
        workers: args.workers,
        cache_dir: args.cache_dir,
        work_dir: args.work_dir,
        log_level: None,
    })?;

    let mut template = load_template(&args.template, &config)?;

    if args.dry_run {
        let yaml = template
            .to_yaml()
            .context("Failed to render merged template")?;
        out.status("🔎", "[DRY RUN]", "Merged template (nothing was built):");
        print!("{}", yaml);
        return Ok(());
    }

    let target = template.target.clone();
    out.heading(&format!(
        "Building {} image for {}-{}-{}",
        target.image_type, target.os, target.dist, target.arch
    ));

    let kind = ProviderKind::for_os(&target.os).map_err(suggestions::explain)?;
    let ctx = BuildContext::new(Arc::new(config))
        .context("Failed to set up build context")?
        .with_progress(out.show_progress());

    let mut registry = ProviderRegistry::new();
    let id = registry
        .register_target(kind, &target.os, &target.dist, &target.arch, ctx)
        .map_err(suggestions::explain)?;
    let provider = registry
        .get_mut(id.as_str())
        .with_context(|| format!("Provider {} was not registered", id))?;

    match run_build(provider, Some(&mut template)) {
        Ok(()) => {
            out.status(
                "✅",
                "[OK]",
                &format!(
                    "Built {} in {:.2}s",
                    template.image.name,
                    start_time.elapsed().as_secs_f64()
                ),
            );
            Ok(())
        }
        Err(e) => {
            out.status("❌", "[ERR]", "Build failed");
            Err(suggestions::explain(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use os_image_composer::output::Output;
    use std::fs;
    use tempfile::TempDir;

    fn globals(config: Option<PathBuf>) -> GlobalArgs {
        GlobalArgs {
            config,
            log_level: None,
            out: Output::new("never", true),
        }
    }

    fn write_config(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("config.yml");
        fs::write(
            &path,
            format!(
                "config_dir: {}\ncache_dir: {}\nwork_dir: {}\nlogging:\n  level: warn\n  file: \"\"\n",
                temp.path().join("config").display(),
                temp.path().join("cache").display(),
                temp.path().join("work").display(),
            ),
        )
        .unwrap();
        path
    }

    fn args(template: PathBuf) -> BuildArgs {
        BuildArgs {
            template,
            workers: None,
            cache_dir: None,
            work_dir: None,
            dry_run: true,
        }
    }

    #[test]
    fn test_missing_template() {
        let temp = TempDir::new().unwrap();
        let config = write_config(&temp);
        let err = execute(args(temp.path().join("nope.yml")), &globals(Some(config))).unwrap_err();
        assert!(err.to_string().contains("Template file not found"));
    }

    #[test]
    fn test_invalid_worker_override() {
        let temp = TempDir::new().unwrap();
        let config = write_config(&temp);
        let mut build = args(temp.path().join("t.yml"));
        build.workers = Some(0);
        let err = execute(build, &globals(Some(config))).unwrap_err();
        assert!(err.to_string().contains("Invalid worker count"));
    }

    #[test]
    fn test_dry_run_merges_and_stops() {
        let temp = TempDir::new().unwrap();
        let config = write_config(&temp);
        let template = temp.path().join("t.yml");
        fs::write(
            &template,
            "image:\n  name: edge\n  version: \"1.0\"\ntarget:\n  os: azure-linux\n  dist: azl3\n  arch: x86_64\n  imageType: raw\nsystemConfig:\n  name: edge\n  packages: [curl]\n",
        )
        .unwrap();

        execute(args(template), &globals(Some(config))).unwrap();
        assert!(!temp.path().join("cache").exists());
    }
}
