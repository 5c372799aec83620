//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_global_config();
//!     fixture.command().arg("config").arg("show").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::templates;
    pub use super::TestFixture;
}

/// Template YAML snippets for testing.
#[allow(dead_code)]
pub mod templates {
    /// A user template that only names its target.
    pub const MINIMAL_USER: &str = r#"
target:
  os: azure-linux
  dist: azl3
  arch: x86_64
  imageType: raw
systemConfig:
  packages: [curl]
"#;

    /// A vendor default for azure-linux/azl3/x86_64 raw images.
    pub const AZL3_DEFAULT_RAW: &str = r#"
image:
  name: azl3-x86_64-default-raw
  version: "3.0"
target:
  os: azure-linux
  dist: azl3
  arch: x86_64
  imageType: raw
systemConfig:
  name: default
  packages: [filesystem, kernel]
  bootloader:
    bootType: efi
    provider: grub
  kernel:
    version: "6.6"
    packages: [kernel]
"#;

    /// A template with an OS that has no provider.
    pub const UNKNOWN_OS: &str = r#"
target:
  os: ubunto
  dist: ubuntu24
  arch: x86_64
  imageType: iso
"#;

    /// A template with a top-level key templates do not have.
    pub const UNKNOWN_KEY: &str = r#"
target:
  os: ubuntu
  dist: ubuntu24
  arch: x86_64
  imageType: iso
packages: [curl]
"#;
}

/// A temporary directory laid out like a working tree of the tool:
/// `os-image-composer.yml`, `config/`, `cache/`, and `workspace/`.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `os-image-composer.yml` pointing every directory into the fixture.
    pub fn with_global_config(self) -> Self {
        let content = format!(
            "workers: 2\nconfig_dir: {}\ncache_dir: {}\nwork_dir: {}\ntemp_dir: {}\nlogging:\n  level: warn\n  file: \"\"\n",
            self.path().join("config").display(),
            self.cache_dir().display(),
            self.work_dir().display(),
            self.path().join("tmp").display(),
        );
        self.with_file("os-image-composer.yml", &content)
    }

    /// Add the vendor default template for a target.
    pub fn with_default_template(
        self,
        os: &str,
        dist: &str,
        arch: &str,
        kind: &str,
        content: &str,
    ) -> Self {
        let path =
            format!("config/osv/{os}/{dist}/imageconfigs/defaultconfigs/default-{kind}-{arch}.yml");
        self.with_file(&path, content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Create an empty directory.
    pub fn with_dir(self, path: &str) -> Self {
        self.temp_dir
            .child(path)
            .create_dir_all()
            .expect("Failed to create directory");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("os-image-composer.yml")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join("cache")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.path().join("workspace")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command running in this fixture's directory with plain output.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("os-image-composer");
        cmd.current_dir(self.path())
            .env_remove("OS_IMAGE_COMPOSER_CONFIG")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }

    /// Create a command with `--config` pointing at the fixture's config file.
    pub fn command_with_config(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("--config").arg(self.config_path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
