//! # Error Handling
//!
//! This module defines the centralized error type for the `os-image-composer`
//! library. It uses the `thiserror` library to create a single `Error` enum
//! covering every anticipated failure mode of a build, with contextual fields
//! (URL, path, provider, stage) carried in each variant.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum representing all errors raised by the library.
//! - **`ErrorKind`**: A coarse classification of an `Error` into the stages of
//!   a build (configuration, resolution, download, build, cleanup). The CLI uses
//!   it to decide how to present a failure; the provider lifecycle uses it to
//!   keep cleanup failures distinct from the error that triggered cleanup.
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Configuration and resolution errors are raised before any package is
//! downloaded. Cleanup errors that follow an earlier failure are wrapped in
//! `Error::CleanupAfterFailure`, whose message and `source()` lead with the
//! original error.

use thiserror::Error;

/// Main error type for os-image-composer operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration file (global config or template) could not be parsed.
    ///
    /// Includes an optional hint on how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A global configuration value is out of range or missing.
    #[error("Invalid configuration for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// A build template failed structural validation.
    #[error("Template validation error in {template}: {message}")]
    TemplateValidation { template: String, message: String },

    /// No vendor default template exists for the requested target.
    #[error("Default configuration not found: {path}")]
    DefaultConfigNotFound { path: String },

    /// The target OS has no provider implementation.
    #[error("Unsupported operating system '{os}' (supported: {supported})")]
    UnsupportedOs { os: String, supported: String },

    /// A repository could not be resolved.
    #[error("Repository resolution error for {repo}: {message}")]
    Resolution { repo: String, message: String },

    /// A `repomd.xml` document had no primary index entry.
    #[error("primary location not found in {url}")]
    PrimaryLocationNotFound { url: String },

    /// A download was requested without any resolved repository.
    #[error("no repository configurations available")]
    NoRepositories,

    /// A network request returned an unexpected status or failed mid-transfer.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// A package artifact failed to download.
    #[error("Download error for {package}: {message}")]
    Download { package: String, message: String },

    /// A downloaded artifact failed checksum verification.
    #[error("Verification failed for {path}: {message}")]
    Verification { path: String, message: String },

    /// Requested packages are not present in any repository index.
    #[error("Packages not found in any repository: {}", names.join(", "))]
    PackageNotFound { names: Vec<String> },

    /// A required host tool is missing and could not be installed.
    #[error("Host dependency error for {tool}: {message}")]
    HostDependency { tool: String, message: String },

    /// A chroot environment operation failed.
    #[error("Chroot {operation} failed: {message}")]
    Chroot { operation: String, message: String },

    /// The image assembler failed.
    #[error("Image build error ({image_type}): {message}")]
    Build { image_type: String, message: String },

    /// The template requested an image type that no assembler handles.
    #[error("unsupported image type: {image_type}")]
    UnsupportedImageType { image_type: String },

    /// A build was started without a template.
    #[error("template cannot be nil")]
    MissingTemplate,

    /// A lifecycle stage was invoked out of order.
    #[error("cannot {stage} provider {provider} in state {state}")]
    InvalidState {
        provider: String,
        stage: String,
        state: String,
    },

    /// A cache cleanup operation failed.
    #[error("Cache cleanup error: {message}")]
    Cleanup { message: String },

    /// A cleanup target resolved outside of its configured root.
    #[error("refusing to operate on {path} because it is outside {root}")]
    PathEscape { path: String, root: String },

    /// Chroot teardown failed after an earlier stage had already failed.
    #[error("{original} (cleanup also failed: {cleanup})")]
    CleanupAfterFailure {
        #[source]
        original: Box<Error>,
        cleanup: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// An HTTP client error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A repository configuration file could not be parsed as INI.
    #[error("INI parsing error: {0}")]
    Ini(#[from] ini::ParseError),

    /// An XML document could not be parsed.
    #[error("XML parsing error in {document}: {message}")]
    Xml { document: String, message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// The stage of a build an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Download,
    Build,
    Cleanup,
    Internal,
}

impl Error {
    /// Classify this error into the build stage that produced it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigParse { .. }
            | Error::ConfigValidation { .. }
            | Error::TemplateValidation { .. }
            | Error::DefaultConfigNotFound { .. }
            | Error::UnsupportedOs { .. }
            | Error::Yaml(_) => ErrorKind::Configuration,
            Error::Resolution { .. }
            | Error::PrimaryLocationNotFound { .. }
            | Error::NoRepositories
            | Error::Network { .. }
            | Error::Http(_)
            | Error::Xml { .. }
            | Error::UrlParse(_)
            | Error::Ini(_) => ErrorKind::Resolution,
            Error::Download { .. } | Error::Verification { .. } | Error::PackageNotFound { .. } => {
                ErrorKind::Download
            }
            Error::Build { .. }
            | Error::UnsupportedImageType { .. }
            | Error::MissingTemplate
            | Error::InvalidState { .. }
            | Error::HostDependency { .. }
            | Error::Chroot { .. } => ErrorKind::Build,
            Error::Cleanup { .. } | Error::PathEscape { .. } | Error::CleanupAfterFailure { .. } => {
                ErrorKind::Cleanup
            }
            Error::Io(_) | Error::Json(_) | Error::LockPoisoned { .. } => ErrorKind::Internal,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
