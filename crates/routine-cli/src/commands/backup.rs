use anyhow::Result;
use owo_colors::{OwoColorize, Style};
use routine_core::backup::{Clock, FileSnapshot, SnapshotOperation, SystemClock};
use routine_core::error::CoreError;
use routine_core::rules::Preset;
use std::path::PathBuf;

use crate::cli::BackupCommand;
use crate::config::Config;
use crate::timezone::normalize_timezone_input;

/// Resolve which workbook a backup command targets.
pub fn resolve_artifact(
    file: Option<PathBuf>,
    preset: Option<Preset>,
    year: Option<i32>,
    config: &Config,
) -> PathBuf {
    file.unwrap_or_else(|| {
        config.artifact_path(config.resolve_preset(preset), config.resolve_year(year))
    })
}

pub fn file_snapshot(artifact: PathBuf, config: &Config) -> FileSnapshot {
    let backup_dir = config.backup_dir_for(&artifact);
    FileSnapshot::new(artifact).with_backup_dir(backup_dir)
}

/// Snapshot `artifact` now, stamped with the configured backup timezone.
pub async fn snapshot_now(artifact: PathBuf, config: &Config) -> Result<PathBuf> {
    let clock = SystemClock::new(normalize_timezone_input(&config.backup.timezone)?);
    let saved = file_snapshot(artifact, config)
        .snapshot(clock.now())
        .await
        .map_err(CoreError::from)?;
    Ok(saved)
}

pub async fn backup_now(command: BackupCommand, config: &Config) -> Result<()> {
    let artifact = resolve_artifact(command.file, command.preset, command.year, config);
    let saved = snapshot_now(artifact, config).await?;

    println!(
        "{} Backup saved: {}",
        "✓".style(Style::new().green().bold()),
        saved.display().to_string().cyan()
    );
    Ok(())
}
