//! Common test utilities for postdraft integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's real data or config directories.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated storage.
///
/// Each `TestEnv` creates three temporary directories:
/// - `data_dir`: drafts, store config and action log (via `PD_DATA_DIR`)
/// - `config_dir`: system config (via `PD_CONFIG_DIR`)
/// - `work_dir`: scratch space for server and form JSON files
///
/// The `pd()` method sets the environment per invocation, so tests can run
/// in parallel.
pub struct TestEnv {
    pub data_dir: TempDir,
    pub config_dir: TempDir,
    pub work_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the pd binary with isolated directories.
    pub fn pd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pd"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("PD_DATA_DIR", self.data_dir.path());
        cmd.env("PD_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("PD_LOG");
        cmd
    }

    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn config_path(&self) -> &Path {
        self.config_dir.path()
    }

    /// Path of the persisted draft record.
    pub fn drafts_file(&self) -> PathBuf {
        self.data_path().join("post-drafts.json")
    }

    /// Write a JSON document into the scratch directory and return its path.
    pub fn write_json(&self, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = self.work_dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    /// Run `pd` with `args` and parse its stdout as JSON, asserting success.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.pd().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "pd {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Server copy used throughout the CLI tests: title "T", one tag.
pub fn sample_server(id: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": "T",
        "content": "",
        "tags": [{ "id": 2, "name": "a" }],
        "is_public": true,
        "locale": "en",
        "should_publish_medium": false
    })
}
