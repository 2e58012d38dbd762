//! Integration tests for the non-interactive countrydex commands

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Isolated cache and config directories so runs never touch the user's.
struct TestEnv {
    temp_dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("countrydex").unwrap();
        cmd.env("XDG_CACHE_HOME", self.path().join("cache"))
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env_remove("RUST_LOG");
        cmd
    }

    /// Command reading the bundled fixture instead of the network.
    fn fixture_cmd(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--source").arg(fixture_path());
        cmd
    }

    fn write_config(&self, content: &str) -> PathBuf {
        let path = self.path().join("countrydex.toml");
        fs::write(&path, content).unwrap();
        path
    }
}

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("countries.json")
}

// =============================================================================
// Query
// =============================================================================

#[test]
fn test_query_finds_single_country() {
    let env = TestEnv::new();
    env.fixture_cmd()
        .args(["query", "uzb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 country matching \"uzb\""))
        .stdout(predicate::str::contains("Uzbekistan\tAsia\t34232050"))
        .stdout(predicate::str::contains("Brazil").not());
}

#[test]
fn test_query_is_case_insensitive() {
    let env = TestEnv::new();
    env.fixture_cmd()
        .args(["query", "BRA"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Brazil\tAmericas\t212559409"));
}

#[test]
fn test_query_lists_in_source_order() {
    let env = TestEnv::new();
    let output = env.fixture_cmd().args(["query", "a"]).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<&str> = stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split('\t').next())
        .collect();
    assert_eq!(names, vec!["Uzbekistan", "Antarctica", "Brazil"]);
    assert!(stdout.starts_with("Found 3 countries matching \"a\""));
}

#[test]
fn test_query_no_match_prints_header_only() {
    let env = TestEnv::new();
    env.fixture_cmd()
        .args(["query", "atlantis"])
        .assert()
        .success()
        .stdout("No matches for \"atlantis\"\n");
}

// =============================================================================
// Show
// =============================================================================

#[test]
fn test_show_prints_details() {
    let env = TestEnv::new();
    env.fixture_cmd()
        .args(["show", "uzbekistan"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Country:\s+Uzbekistan").unwrap())
        .stdout(predicate::str::is_match(r"Population:\s+34,232,050").unwrap())
        .stdout(predicate::str::is_match(r"Capital:\s+Tashkent").unwrap())
        .stdout(predicate::str::is_match(r"Area:\s+447,400 km²").unwrap())
        .stdout(predicate::str::is_match(r"Languages:\s+Russian, Uzbek").unwrap());
}

#[test]
fn test_show_missing_capital_uses_placeholder() {
    let env = TestEnv::new();
    env.fixture_cmd()
        .args(["show", "Antarctica"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Capital:\s+N/A").unwrap())
        .stdout(predicate::str::is_match(r"Currencies:\s+N/A").unwrap());
}

#[test]
fn test_show_unknown_country_fails() {
    let env = TestEnv::new();
    env.fixture_cmd()
        .args(["show", "Atlantis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no country named \"Atlantis\""));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_missing_source_file_fails() {
    let env = TestEnv::new();
    let missing = env.path().join("nowhere.json");
    env.cmd()
        .arg("--source")
        .arg(&missing)
        .args(["query", "uzb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load countries"));
}

#[test]
fn test_malformed_source_file_fails() {
    let env = TestEnv::new();
    let broken = env.path().join("broken.json");
    fs::write(&broken, "{\"status\": 404, \"message\": \"Not Found\"}").unwrap();
    env.cmd()
        .arg("--source")
        .arg(&broken)
        .args(["query", "uzb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed country list"));
}

#[test]
fn test_missing_config_path_fails() {
    let env = TestEnv::new();
    let missing = env.path().join("absent.toml");
    env.fixture_cmd()
        .arg("--config")
        .arg(&missing)
        .args(["query", "uzb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_invalid_config_fails() {
    let env = TestEnv::new();
    let config = env.write_config("endpoint = \"ftp://example.invalid\"\n");
    env.fixture_cmd()
        .arg("--config")
        .arg(&config)
        .args(["query", "uzb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be an http(s) URL"));
}

#[test]
fn test_valid_config_is_accepted() {
    let env = TestEnv::new();
    let config = env.write_config(
        "request_timeout_secs = 5\n\n[keys.global]\nquit = \"x\"\n\n[ui.grid]\ncard_width = 24\n",
    );
    env.fixture_cmd()
        .arg("--config")
        .arg(&config)
        .args(["query", "brazil"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Brazil"));
}

#[test]
fn test_writes_log_file() {
    let env = TestEnv::new();
    env.fixture_cmd().args(["query", "uzb"]).assert().success();

    let log_dir = env.path().join("cache").join("countrydex").join("log");
    let entries: Vec<_> = fs::read_dir(&log_dir).unwrap().collect();
    assert!(!entries.is_empty(), "no log file in {}", log_dir.display());
}
