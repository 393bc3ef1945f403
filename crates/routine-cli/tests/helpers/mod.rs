#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test harness running the CLI inside a throwaway working directory
pub struct CliTestHarness {
    temp_dir: TempDir,
}

impl CliTestHarness {
    /// Create a new test harness with an empty working directory
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        Self { temp_dir }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("routine").expect("Failed to find routine binary");
        cmd.current_dir(self.temp_dir.path());
        cmd.env("ROUTINE_BACKUP__TIMEZONE", "UTC");
        cmd.env_remove("RUST_LOG");
        cmd.env_remove("ROUTINE_PRESET");
        cmd.env_remove("ROUTINE_YEAR");
        cmd.env_remove("ROUTINE_OUTPUT_DIR");
        cmd
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Write `routine.toml` into the working directory
    pub fn write_config(&self, contents: &str) {
        fs::write(self.path("routine.toml"), contents).expect("Failed to write config");
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Parse a generated workbook
    pub fn read_workbook(&self, name: &str) -> serde_json::Value {
        let text = fs::read_to_string(self.path(name)).expect("Workbook was not written");
        serde_json::from_str(&text).expect("Workbook is not valid JSON")
    }

    /// Files written into the backup directory
    pub fn backups(&self) -> Vec<String> {
        match fs::read_dir(self.path("backups")) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                names
            }
            Err(_) => Vec::new(),
        }
    }
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub fn generate_task_manager_args() -> Vec<&'static str> {
        vec!["generate", "--preset", "task-manager", "--year", "2025", "--force"]
    }

    pub fn generate_general_routine_args() -> Vec<&'static str> {
        vec!["generate", "--preset", "general-routine", "--year", "2025", "--force"]
    }

    /// One daily standup and a Monday meeting
    pub fn standup_config() -> &'static str {
        r#"
preset = "general-routine"

[rules]
categories = ["Work"]

[[rules.templates]]
description = "Standup"
category = "Work"
priority = "High"
time = "09:00"

[[rules.templates]]
description = "Team Meeting"
category = "Work"
priority = "High"
time = "14:00"
recurrence = { kind = "weekly", weekday = 0 }
"#
    }
}

/// Utility functions for inspecting workbooks
pub mod workbook {
    use serde_json::Value;

    pub fn sheet_names(workbook: &Value) -> Vec<String> {
        workbook["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| s["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn rows<'a>(workbook: &'a Value, sheet: &str) -> &'a [Value] {
        workbook["sheets"]
            .as_array()
            .and_then(|sheets| sheets.iter().find(|s| s["name"] == sheet))
            .and_then(|s| s["rows"].as_array())
            .map(|rows| rows.as_slice())
            .unwrap_or(&[])
    }
}
