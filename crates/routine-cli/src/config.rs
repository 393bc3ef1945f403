use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use routine_core::backup::{BackupConfig, DEFAULT_BACKUP_DIR};
use routine_core::error::ConfigurationError;
use routine_core::models::StatusVocabulary;
use routine_core::rules::{MonthOverflowPolicy, Preset, RuleModel, RuleModelConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::parser::parse_clock_time;
use crate::timezone::detect_system_timezone;

pub const CONFIG_FILE: &str = "routine.toml";

#[derive(Deserialize, Debug)]
pub struct Config {
    /// Preset used when a command does not name one
    #[serde(default)]
    pub preset: Preset,
    /// Year used when a command does not name one; the current year otherwise
    #[serde(default)]
    pub year: Option<i32>,
    /// Directory the workbook is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Overrides the preset's status vocabulary
    #[serde(default)]
    pub status_vocabulary: Option<StatusVocabulary>,
    /// Overrides the preset's month-overflow policy
    #[serde(default)]
    pub month_overflow: Option<MonthOverflowPolicy>,
    #[serde(default)]
    pub backup: BackupSettings,
    /// A complete custom rule model replacing the preset's
    #[serde(default)]
    pub rules: Option<RuleModelConfig>,
}

/// Daily backup settings
#[derive(Deserialize, Debug)]
pub struct BackupSettings {
    /// Local wall-clock time, `HH:MM`
    #[serde(default = "default_backup_time")]
    pub at: String,
    /// IANA timezone the backup time is read in
    #[serde(default = "detect_system_timezone")]
    pub timezone: String,
    /// Directory, relative to the workbook, that receives snapshots
    #[serde(default = "default_backup_dir")]
    pub directory: String,
    /// Give up on a snapshot after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            at: default_backup_time(),
            timezone: detect_system_timezone(),
            directory: default_backup_dir(),
            timeout_secs: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_backup_time() -> String {
    "23:59".to_string()
}

fn default_backup_dir() -> String {
    DEFAULT_BACKUP_DIR.to_string()
}

impl Config {
    /// Merge the TOML file (if present) with `ROUTINE_*` environment
    /// variables. Nested keys use a double underscore, e.g.
    /// `ROUTINE_BACKUP__AT=22:00`.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.unwrap_or_else(|| Path::new(CONFIG_FILE))))
            .merge(Env::prefixed("ROUTINE_").split("__"))
            .extract()
    }

    pub fn resolve_preset(&self, preset: Option<Preset>) -> Preset {
        preset.unwrap_or(self.preset)
    }

    pub fn resolve_year(&self, year: Option<i32>) -> i32 {
        year.or(self.year).unwrap_or_else(|| Local::now().year())
    }

    /// The rule model for `preset` with configured overrides applied.
    pub fn rule_model(&self, preset: Preset) -> Result<RuleModel, ConfigurationError> {
        let mut rules = self.rules.clone().unwrap_or_else(|| preset.config());
        if let Some(vocabulary) = self.status_vocabulary {
            rules.status_vocabulary = vocabulary;
        }
        if let Some(policy) = self.month_overflow {
            rules.month_overflow = policy;
        }
        RuleModel::new(rules)
    }

    /// `<output_dir>/<preset stem><year>.json`
    pub fn artifact_path(&self, preset: Preset, year: i32) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.json", preset.artifact_stem(), year))
    }

    pub fn backup_dir_for(&self, artifact: &Path) -> PathBuf {
        match artifact.parent() {
            Some(parent) => parent.join(&self.backup.directory),
            None => PathBuf::from(&self.backup.directory),
        }
    }

    pub fn backup_config(&self, at_override: Option<&str>) -> Result<BackupConfig> {
        let at = at_override.unwrap_or(&self.backup.at);
        let fire_at = parse_clock_time(at).context("Invalid backup time")?;
        Ok(BackupConfig {
            fire_at,
            snapshot_timeout: self.backup.timeout_secs.map(std::time::Duration::from_secs),
        })
    }
}
