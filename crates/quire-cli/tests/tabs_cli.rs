//! Integration tests for tab management commands.
//!
//! These tests validate:
//! - Opening, switching, moving and closing tabs
//! - Tab state surviving between invocations
//! - The configured tab limit
//! - Reset and recovery from a corrupt state file
//! - `presets` and `config show`

mod common;

use std::fs;

use predicates::prelude::*;
use tempfile::TempDir;

use common::{quire_in, quire_json};

fn tab_labels(tabs: &serde_json::Value) -> Vec<String> {
    tabs["tabs"]
        .as_array()
        .expect("tabs array")
        .iter()
        .map(|t| t["label"].as_str().unwrap_or_default().to_string())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_tabs_empty_data_dir() {
    let temp = TempDir::new().expect("create temp dir");

    quire_in(temp.path())
        .arg("tabs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tabs open"));

    let tabs = quire_json(temp.path(), &["tabs", "--json"]);
    assert!(tabs["activeTabId"].is_null());
    assert_eq!(tabs["tabs"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_new_tabs_persist_between_runs() {
    let temp = TempDir::new().expect("create temp dir");

    quire_in(temp.path())
        .args(["new", "rewrite"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened tab `Rewrite`"));
    quire_in(temp.path())
        .args(["new", "Rewrite"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened tab `Rewrite 2`"));
    quire_in(temp.path()).args(["new", "summarize"]).assert().success();

    let tabs = quire_json(temp.path(), &["tabs", "--json"]);
    assert_eq!(tab_labels(&tabs), ["Rewrite", "Rewrite 2", "Summarize"]);
    assert_eq!(tabs["activeTabId"], tabs["tabs"][2]["id"]);

    quire_in(temp.path())
        .arg("tabs")
        .assert()
        .success()
        .stdout(predicate::str::contains("LABEL"))
        .stdout(predicate::str::contains("Rewrite 2"));
}

#[test]
fn test_unknown_preset_fails() {
    let temp = TempDir::new().expect("create temp dir");

    quire_in(temp.path())
        .args(["new", "translate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Preset `translate` not found"));
}

#[test]
fn test_switch_move_and_close() {
    let temp = TempDir::new().expect("create temp dir");
    for preset in ["freeform", "rewrite", "summarize"] {
        quire_in(temp.path()).args(["new", preset]).assert().success();
    }

    quire_in(temp.path())
        .args(["switch", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to `Freeform`"));

    quire_in(temp.path()).args(["move", "3", "1"]).assert().success();
    let tabs = quire_json(temp.path(), &["tabs", "--json"]);
    assert_eq!(tab_labels(&tabs), ["Summarize", "Freeform", "Rewrite"]);
    assert_eq!(tabs["activeTabId"], tabs["tabs"][1]["id"], "move keeps the active tab");

    quire_in(temp.path())
        .args(["move", "1", "9"])
        .assert()
        .failure();

    // Closing the active tab hands focus to its right-hand neighbour.
    quire_in(temp.path())
        .arg("close")
        .assert()
        .success()
        .stdout(predicate::str::contains("Closed tab `Freeform`"))
        .stdout(predicate::str::contains("Active tab: `Rewrite`"));

    let tabs = quire_json(temp.path(), &["tabs", "--json"]);
    assert_eq!(tab_labels(&tabs), ["Summarize", "Rewrite"]);

    quire_in(temp.path())
        .args(["close", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Tab `9` not found"));
}

#[test]
fn test_tab_limit_from_config() {
    let temp = TempDir::new().expect("create temp dir");
    fs::write(temp.path().join("config.yaml"), "maxTabs: 2\n").expect("write config");

    quire_in(temp.path()).args(["new", "freeform"]).assert().success();
    quire_in(temp.path()).args(["new", "freeform"]).assert().success();
    quire_in(temp.path())
        .args(["new", "freeform"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Tab limit reached (2 tabs)"));

    let tabs = quire_json(temp.path(), &["tabs", "--json"]);
    assert_eq!(tab_labels(&tabs).len(), 2);
}

#[test]
fn test_reset_removes_state() {
    let temp = TempDir::new().expect("create temp dir");
    quire_in(temp.path()).args(["new", "rewrite"]).assert().success();
    assert!(temp.path().join("state/quire.tabs.json").exists());

    quire_in(temp.path())
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Closed 1 tab(s)"));

    assert!(!temp.path().join("state/quire.tabs.json").exists());
    quire_in(temp.path())
        .arg("tabs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tabs open"));
}

#[test]
fn test_corrupt_state_is_discarded() {
    let temp = TempDir::new().expect("create temp dir");
    let state_dir = temp.path().join("state");
    fs::create_dir_all(&state_dir).expect("create state dir");
    fs::write(state_dir.join("quire.tabs.json"), "{ not json").expect("write state");

    quire_in(temp.path())
        .arg("tabs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tabs open"));

    assert!(!state_dir.join("quire.tabs.json").exists());
}

#[test]
fn test_quiet_suppresses_status() {
    let temp = TempDir::new().expect("create temp dir");

    quire_in(temp.path())
        .args(["--quiet", "new", "rewrite"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_presets_lists_defaults() {
    let temp = TempDir::new().expect("create temp dir");

    quire_in(temp.path())
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("Freeform"))
        .stdout(predicate::str::contains("Rewrite"))
        .stdout(predicate::str::contains("Summarize"));
}

#[test]
fn test_config_show() {
    let temp = TempDir::new().expect("create temp dir");
    fs::write(temp.path().join("config.yaml"), "maxTabs: 3\nowner: alice\n")
        .expect("write config");

    let config = quire_json(temp.path(), &["config", "show", "--json"]);
    assert_eq!(config["maxTabs"], 3);
    assert_eq!(config["owner"], "alice");
    assert_eq!(config["storageKey"], "quire.tabs");

    quire_in(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("maxTabs: 3"));
}

#[test]
fn test_invalid_config_fails_startup() {
    let temp = TempDir::new().expect("create temp dir");
    fs::write(temp.path().join("config.yaml"), "maxTabs: 0\n").expect("write config");

    quire_in(temp.path())
        .arg("tabs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to initialize Quire"))
        .stderr(predicate::str::contains("maxTabs cannot be 0"));
}
