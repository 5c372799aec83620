//! CLI argument parsing and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use os_image_composer::config::{ConfigOverrides, GlobalConfig};
use os_image_composer::defaults::{CONFIG_ENV_VAR, DEFAULT_LOG_LEVEL};
use os_image_composer::logging;
use os_image_composer::output::Output;
use os_image_composer::suggestions;

use crate::commands;

/// OS Image Composer - Build bootable Linux images from declarative templates
#[derive(Parser, Debug)]
#[command(name = "os-image-composer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Global configuration file
    #[arg(long, global = true, value_name = "FILE", env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Set log level (debug, info, warn, error); overrides the config file
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Only print errors and requested data
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an image from a template
    Build(commands::build::BuildArgs),

    /// Validate a template without building it
    Validate(commands::validate::ValidateArgs),

    /// Manage the package cache and chroot workspaces
    Cache(commands::cache::CacheArgs),

    /// Create or inspect the global configuration
    Config(commands::config::ConfigArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

/// Global flags every command sees.
#[derive(Debug)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub log_level: Option<String>,
    pub out: Output,
}

impl GlobalArgs {
    /// Discover the global config, apply `overrides`, and start logging.
    pub fn load_config(&self, mut overrides: ConfigOverrides) -> Result<GlobalConfig> {
        if let Some(path) = &self.config {
            if !path.exists() {
                return Err(suggestions::config_not_found(path));
            }
        }

        let (mut config, source) =
            GlobalConfig::discover(self.config.as_deref()).map_err(suggestions::explain)?;

        if overrides.log_level.is_none() {
            overrides.log_level = self.log_level.clone();
        }
        config
            .apply_overrides(&overrides)
            .map_err(suggestions::explain)?;

        let log_file = (!config.logging.file.is_empty()).then(|| Path::new(&config.logging.file));
        logging::init(&config.logging.level, self.log_level.as_deref(), log_file)
            .context("Failed to initialize logging")?;

        match source {
            Some(path) => log::debug!("Loaded global config from {}", path.display()),
            None => log::debug!("Using built-in global config defaults"),
        }
        Ok(config)
    }

    /// Start logging without reading a config file.
    pub fn init_logging(&self) -> Result<()> {
        let level = self.log_level.as_deref();
        logging::init(DEFAULT_LOG_LEVEL, level, None).map_err(suggestions::explain)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let globals = GlobalArgs {
            config: self.config,
            log_level: self.log_level,
            out: Output::new(&self.color, self.quiet),
        };

        match self.command {
            Commands::Build(args) => commands::build::execute(args, &globals),
            Commands::Validate(args) => commands::validate::execute(args, &globals),
            Commands::Cache(args) => commands::cache::execute(args, &globals),
            Commands::Config(args) => commands::config::execute(args, &globals),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
