//! # Error Suggestions
//!
//! Hint-bearing errors for the mistakes users make most often. Library
//! errors stay plain; the CLI converts them with [`explain`] so the message
//! says what went wrong and what to do about it.
//!
//! ```rust,ignore
//! use os_image_composer::suggestions;
//!
//! let template = load_and_merge(&path, &config).map_err(suggestions::explain)?;
//! ```

use std::path::Path;

use crate::config::LOG_LEVELS;
use crate::defaults::{CONFIG_ENV_VAR, MAX_WORKERS, TOOL_NAME};
use crate::error::Error;
use crate::provider::SUPPORTED_OS;
use crate::template::ImageType;

/// The template file given on the command line does not exist.
pub fn template_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Template file not found: {path}\n\n\
         hint: Check the path, templates are usually under image-templates/\n\
         hint: Template files must end in .yml or .yaml",
        path = path.display()
    )
}

/// The `--config` file (or its environment variable) names a missing file.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Run '{TOOL_NAME} config init' to create one\n\
         hint: Use --config to specify a different path\n\
         hint: Unset {CONFIG_ENV_VAR} to use the default search paths",
        path = path.display()
    )
}

/// `config init` would overwrite an existing file.
pub fn config_exists(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file already exists: {path}\n\n\
         hint: Use --force to overwrite it",
        path = path.display()
    )
}

/// The template targets an OS without a provider.
pub fn unsupported_os(os: &str) -> anyhow::Error {
    let did_you_mean = find_similar(os, &SUPPORTED_OS)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unsupported operating system: {os}{did_you_mean}\n\n\
         Supported operating systems are: {supported}\n\
         hint: Set target.os in your template",
        supported = SUPPORTED_OS.join(", ")
    )
}

/// The template asks for an image type no assembler builds.
pub fn unsupported_image_type(image_type: &str) -> anyhow::Error {
    let types: Vec<&str> = ImageType::ALL.iter().map(|t| t.as_str()).collect();
    let did_you_mean = find_similar(image_type, &types)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unsupported image type: {image_type}{did_you_mean}\n\n\
         hint: Set target.imageType to one of: {types}",
        types = types.join(", ")
    )
}

/// The worker count is outside the accepted range.
pub fn invalid_workers(value: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid worker count: {value}\n\n\
         hint: Use a value between 1 and {MAX_WORKERS}\n\
         hint: Set 'workers' in the config file or pass --workers"
    )
}

/// The log level is not one the logger understands.
pub fn invalid_log_level(value: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid log level: {value}\n\n\
         hint: Use one of: {levels}",
        levels = LOG_LEVELS.join(", ")
    )
}

/// No vendor default template exists for the target.
pub fn default_config_missing(path: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Default configuration not found: {path}\n\n\
         hint: Check target.os, target.dist and target.arch in your template\n\
         hint: Check that config_dir points at the vendor configuration tree"
    )
}

/// Convert a library error into a user-facing one, attaching hints where a
/// common mistake is the likely cause.
pub fn explain(err: Error) -> anyhow::Error {
    match err {
        Error::UnsupportedOs { os, .. } => unsupported_os(&os),
        Error::UnsupportedImageType { image_type } => unsupported_image_type(&image_type),
        Error::DefaultConfigNotFound { path } => default_config_missing(&path),
        Error::ConfigValidation { field, message } if field == "workers" => {
            invalid_workers(&message)
        }
        Error::ConfigValidation { field, message } if field == "logging.level" => {
            invalid_log_level(&message)
        }
        other => anyhow::Error::new(other),
    }
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, edit_distance(input, candidate)))
        .filter(|&(_, distance)| distance <= 2 && distance < input.len())
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance, computed with a single rolling row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }

    row[b_chars.len()]
}
