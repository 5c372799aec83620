//! # OS Image Composer CLI
//!
//! This is the binary entry point for the `os-image-composer` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Returning errors to `main`, which prints the `Error: ...` chain and exits
//!   non-zero.
//!
//! The build pipeline lives in the `os_image_composer` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
