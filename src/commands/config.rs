//! # Config Command Implementation
//!
//! This module implements the `config` subcommand.
//!
//! ## Subcommands
//!
//! - **`init [PATH]`**: Write the default global configuration, with comments
//!   explaining each setting. Refuses to overwrite without `--force`.
//! - **`show`**: Print the effective configuration (file, defaults, and
//!   `--log-level`) as YAML.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use os_image_composer::config::{ConfigOverrides, GlobalConfig};
use os_image_composer::defaults::TOOL_NAME;
use os_image_composer::suggestions;

use crate::cli::GlobalArgs;

/// Create or inspect the global configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Write a commented default configuration file
    Init(InitArgs),
    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the file
    #[arg(value_name = "PATH", default_value = "os-image-composer.yml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the `config` command.
pub fn execute(args: ConfigArgs, globals: &GlobalArgs) -> Result<()> {
    match args.command {
        ConfigSubcommand::Init(init_args) => execute_init(init_args, globals),
        ConfigSubcommand::Show => execute_show(globals),
    }
}

fn execute_init(args: InitArgs, globals: &GlobalArgs) -> Result<()> {
    globals.init_logging()?;

    if args.path.exists() && !args.force {
        return Err(suggestions::config_exists(&args.path));
    }

    GlobalConfig::default()
        .save_with_comments(&args.path)
        .map_err(suggestions::explain)
        .with_context(|| format!("Failed to write {}", args.path.display()))?;

    let out = &globals.out;
    out.status(
        "✅",
        "[OK]",
        &format!("Created {}", args.path.display()),
    );
    out.status(
        "💡",
        "[TIP]",
        &format!(
            "Run `{} build <template> --config {}` to use it",
            TOOL_NAME,
            args.path.display()
        ),
    );
    Ok(())
}

fn execute_show(globals: &GlobalArgs) -> Result<()> {
    let config = globals.load_config(ConfigOverrides::default())?;
    let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
    print!("{}", yaml);
    Ok(())
}
