//! # CLI Command Implementations
//!
//! Each subcommand of `os-image-composer` lives in its own file with:
//! - an `Args` struct derived with `clap`;
//! - an `execute` function taking the parsed `Args` and the global flags.
//!
//! Commands load the global configuration through
//! [`GlobalArgs::load_config`](crate::cli::GlobalArgs::load_config), call into
//! the `os_image_composer` library, and convert library errors with
//! `suggestions::explain` so users see hints.

pub mod build;
pub mod cache;
pub mod completions;
pub mod config;
pub mod validate;
