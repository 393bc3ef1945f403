use anyhow::Result;
use chrono::NaiveTime;
use chrono_humanize::HumanTime;
use owo_colors::{OwoColorize, Style};
use routine_core::backup::{
    next_fire_time, BackupHandle, BackupOutcome, BackupScheduler, Clock, SchedulerState,
    SystemClock,
};
use routine_core::timezone::format_local;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cli::{GenerateCommand, PartitionArg, WatchCommand};
use crate::commands::generate::generate_workbook;
use crate::commands::backup::{file_snapshot, resolve_artifact};
use crate::config::Config;
use crate::timezone::normalize_timezone_input;

pub async fn watch_backups(command: WatchCommand, config: &Config) -> Result<()> {
    let artifact = resolve_artifact(command.file.clone(), command.preset, command.year, config);
    let backup_config = config.backup_config(command.at.as_deref())?;
    let timezone = normalize_timezone_input(
        command.timezone.as_deref().unwrap_or(&config.backup.timezone),
    )?;
    let clock = Arc::new(SystemClock::new(timezone));

    if !artifact.exists() {
        if command.generate {
            generate_workbook(missing_workbook(&command, artifact.clone()), config).await?;
        } else {
            println!(
                "{} Workbook '{}' does not exist yet; backups will fail until it is generated (use --generate)",
                "Warning:".yellow().bold(),
                artifact.display()
            );
        }
    }

    let fire_at = backup_config.fire_at;
    let snapshot = Arc::new(file_snapshot(artifact.clone(), config));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = BackupScheduler::new(backup_config, snapshot, clock.clone())
        .with_reports(tx)
        .spawn();

    println!(
        "{} Watching {} (daily at {}, {})",
        "Backup".blue().bold(),
        artifact.display().to_string().cyan(),
        fire_at.format("%H:%M"),
        timezone.name().magenta()
    );
    print_next_fire(&handle, clock.as_ref(), fire_at);

    let success_style = Style::new().green().bold();
    let failure_style = Style::new().red().bold();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            report = rx.recv() => {
                let Some(report) = report else { break };
                match report.outcome {
                    BackupOutcome::Saved(path) => println!(
                        "{} Backup saved: {}",
                        "✓".style(success_style),
                        path.display().to_string().cyan()
                    ),
                    BackupOutcome::Failed(error) => eprintln!(
                        "{} Backup for {} failed: {}",
                        "Error:".style(failure_style),
                        report.scheduled_for.format("%Y-%m-%d %H:%M"),
                        error
                    ),
                }
                print_next_fire(&handle, clock.as_ref(), fire_at);
            }
        }
    }

    handle.shutdown().await;
    println!("Backup scheduler stopped.");
    Ok(())
}

/// The default generation run for a workbook `watch` was asked to create.
fn missing_workbook(command: &WatchCommand, artifact: std::path::PathBuf) -> GenerateCommand {
    GenerateCommand {
        preset: command.preset,
        year: command.year,
        output: Some(artifact),
        partition: PartitionArg::Month,
        row_limit: None,
        continue_on_error: false,
        verify: false,
        force: false,
        backup: false,
    }
}

fn print_next_fire(handle: &BackupHandle, clock: &SystemClock, fire_at: NaiveTime) {
    let now = clock.now();
    let next_fire = match handle.state() {
        SchedulerState::Armed { next_fire } if next_fire > now => next_fire,
        _ => next_fire_time(now, fire_at),
    };
    println!(
        "  {} Next backup {} ({})",
        "→".blue(),
        HumanTime::from(next_fire - now),
        format_local(clock.timezone(), next_fire)
    );
}
