//! Logger setup for the command-line tool.
//!
//! Level precedence, lowest to highest: `logging.level` from the global
//! config, `RUST_LOG`, then the `--log-level` flag. When a log file is
//! configured, every record is written to both stderr and the file.

use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Writes each record to stderr and appends it to a log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Parse a level name (`debug`, `info`, `warn`, `error`, `trace`, `off`).
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level).map_err(|_| Error::ConfigValidation {
        field: "logging.level".to_string(),
        message: format!("unknown log level '{}'", level),
    })
}

/// Initialize the global logger.
///
/// `config_level` comes from the global config, `flag_level` from the command
/// line. Calling this more than once keeps the first logger.
pub fn init(config_level: &str, flag_level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(parse_level(config_level)?);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if let Some(level) = flag_level {
        builder.filter_level(parse_level(level)?);
    }

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
    }

    // A logger installed earlier (tests, embedding applications) stays in place.
    let _ = builder.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_accepts_known_levels() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("WARN").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_level("error").unwrap(), LevelFilter::Error);
    }

    #[test]
    fn test_parse_level_rejects_unknown() {
        let err = parse_level("loud").unwrap_err();
        assert!(err.to_string().contains("unknown log level"));
    }

    #[test]
    fn test_tee_writer_appends_to_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("tee.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let mut tee = TeeWriter { file };
        tee.write_all(b"[INFO] hello\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[INFO] hello\n");
    }
}
