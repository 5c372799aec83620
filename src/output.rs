//! # Terminal Output
//!
//! Human-facing output for the command-line tool: status lines, styled
//! headings, and whether progress bars are shown. Diagnostics go through
//! `log`; this module only covers what a command prints as its result.
//!
//! Color is controlled by `--color=always|never|auto`. In auto mode colors are
//! off when `NO_COLOR` is set, when `CLICOLOR=0`, when `TERM=dumb`, or when
//! stdout is not a terminal (unless `CLICOLOR_FORCE=1`).
//!
//! ```rust,ignore
//! use os_image_composer::output::Output;
//!
//! let out = Output::new("auto", false);
//! out.status("✅", "[OK]", "Template is valid");
//! ```

use console::style;
use std::env;

/// Printing preferences resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct Output {
    pub use_color: bool,
    /// Suppress everything except errors and requested data.
    pub quiet: bool,
}

impl Output {
    pub fn new(color_flag: &str, quiet: bool) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => detect_color_support(),
        };
        Self { use_color, quiet }
    }

    /// Print `message` prefixed with `marker`, or `plain` when colors are off.
    pub fn status(&self, marker: &str, plain: &str, message: &str) {
        if !self.quiet {
            println!("{} {}", self.marker(marker, plain), message);
        }
    }

    /// Print a section heading, bold when colors are on.
    pub fn heading(&self, text: &str) {
        if self.quiet {
            return;
        }
        if self.use_color {
            println!("{}", style(text).bold());
        } else {
            println!("{}", text);
        }
    }

    /// Print a plain line unless quiet.
    pub fn line(&self, text: &str) {
        if !self.quiet {
            println!("{}", text);
        }
    }

    /// Whether long-running steps should draw progress bars.
    pub fn show_progress(&self) -> bool {
        !self.quiet && console::Term::stderr().is_term()
    }

    pub fn marker<'a>(&self, marker: &'a str, plain: &'a str) -> &'a str {
        if self.use_color {
            marker
        } else {
            plain
        }
    }
}

fn detect_color_support() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}

/// Human-readable byte count (`512 B`, `1.50 KB`, ...).
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
