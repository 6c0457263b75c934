//! Shared test utilities for quire-cli integration tests.

use std::path::Path;

use assert_cmd::Command;

/// Get a Command for the quire binary.
///
/// # Panics
///
/// Panics if the quire binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn quire_cmd() -> Command {
    Command::cargo_bin("quire").expect("quire binary should exist")
}

/// A quire command bound to `data_dir`, colors off and no ambient overrides.
pub fn quire_in(data_dir: &Path) -> Command {
    let mut cmd = quire_cmd();
    cmd.env_remove("QUIRE_CONFIG")
        .env_remove("QUIRE_VERBOSE")
        .env_remove("QUIRE_QUIET")
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--color", "never"]);
    cmd
}

/// Run `args` in `data_dir` and parse stdout as JSON.
pub fn quire_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = quire_in(data_dir)
        .args(args)
        .output()
        .expect("run quire");
    assert!(
        output.status.success(),
        "quire {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}
