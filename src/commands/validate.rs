//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks an image
//! template without building it.
//!
//! By default only the user template is checked, so partial templates pass as
//! long as they name a complete target. With `--merged` the template is merged
//! over its vendor default and the result must be complete.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use os_image_composer::config::ConfigOverrides;
use os_image_composer::provider::ProviderKind;
use os_image_composer::suggestions;
use os_image_composer::template::{validate_template, ImageTemplate, ValidationScope};

use crate::cli::GlobalArgs;
use crate::commands::build::load_template;

/// Validate an image template
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Image template to validate
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// Merge with the vendor default and validate the result
    #[arg(long)]
    pub merged: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, globals: &GlobalArgs) -> Result<()> {
    let out = &globals.out;
    out.status(
        "🔍",
        "[SCAN]",
        &format!("Validating template: {}", args.template.display()),
    );

    let template = if args.merged {
        let config = globals.load_config(ConfigOverrides::default())?;
        load_template(&args.template, &config)?
    } else {
        globals.init_logging()?;
        if !args.template.is_file() {
            return Err(suggestions::template_not_found(&args.template));
        }
        let template = ImageTemplate::load(&args.template).map_err(suggestions::explain)?;
        validate_template(
            &template,
            ValidationScope::User,
            &args.template.display().to_string(),
        )
        .map_err(suggestions::explain)?;
        template
    };

    ProviderKind::for_os(&template.target.os).map_err(suggestions::explain)?;

    let scope = if args.merged { "Merged template" } else { "Template" };
    out.status(
        "✅",
        "[OK]",
        &format!("{} is valid ({})", scope, template.provider_id()),
    );
    Ok(())
}
