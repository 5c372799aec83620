//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and check what a user sees when
//! validating templates, with and without the vendor default merged in.

mod common;
use common::prelude::*;

/// Test that validate --help shows help information
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_help() {
    TestFixture::new()
        .command()
        .arg("validate")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validate a template without building it"))
        .stdout(predicate::str::contains("--merged"));
}

/// Test that a partial user template passes user-scope validation
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_partial_template() {
    let fixture = TestFixture::new()
        .with_global_config()
        .with_file("image.yml", templates::MINIMAL_USER);

    fixture
        .command()
        .arg("validate")
        .arg("image.yml")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Template is valid (azure-linux-azl3-x86_64)",
        ));
}

/// Test that --merged requires the merged result to be complete
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_merged_without_default_fails() {
    let fixture = TestFixture::new()
        .with_global_config()
        .with_file("image.yml", templates::MINIMAL_USER);

    fixture
        .command()
        .arg("validate")
        .arg("image.yml")
        .arg("--merged")
        .assert()
        .failure()
        .stderr(predicate::str::contains("image.name is required"));
}

/// Test that --merged succeeds once the vendor default exists
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_merged_with_default() {
    let fixture = TestFixture::new()
        .with_global_config()
        .with_default_template("azure-linux", "azl3", "x86_64", "raw", templates::AZL3_DEFAULT_RAW)
        .with_file("image.yml", templates::MINIMAL_USER);

    fixture
        .command()
        .arg("validate")
        .arg("image.yml")
        .arg("--merged")
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged template is valid"));
}

/// Test that an unknown OS gets a did-you-mean hint
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_unknown_os_suggests() {
    let fixture = TestFixture::new().with_file("image.yml", templates::UNKNOWN_OS);

    fixture
        .command()
        .arg("validate")
        .arg("image.yml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported operating system: ubunto"))
        .stderr(predicate::str::contains("Did you mean 'ubuntu'?"));
}

/// Test that unknown top-level keys are rejected with a hint
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_unknown_key() {
    let fixture = TestFixture::new().with_file("image.yml", templates::UNKNOWN_KEY);

    fixture
        .command()
        .arg("validate")
        .arg("image.yml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field"))
        .stderr(predicate::str::contains("Top-level keys are"));
}

/// Test that a missing template file is reported with hints
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_missing_template() {
    TestFixture::new()
        .command()
        .arg("validate")
        .arg("missing.yml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Template file not found: missing.yml"))
        .stderr(predicate::str::contains("hint:"));
}
