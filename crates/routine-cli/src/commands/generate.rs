use anyhow::Result;
use chrono::NaiveDate;
use dialoguer::Confirm;
use owo_colors::{OwoColorize, Style};
use routine_core::error::CoreError;
use routine_core::recurrence::{expand_year, summarize};
use routine_core::replication::{
    by_iso_week, by_month, verify_consistency, FailurePolicy, PeriodKey, Replicator,
};
use routine_core::workbook::JsonWorkbookSink;
use tracing::info;

use crate::cli::{GenerateCommand, PartitionArg};
use crate::commands::backup::snapshot_now;
use crate::config::Config;
use crate::views::table::{display_summary, display_views};

/// Failures listed individually before the rest are summarized.
const MAX_LISTED_FAILURES: usize = 10;

pub async fn generate_workbook(command: GenerateCommand, config: &Config) -> Result<()> {
    let preset = config.resolve_preset(command.preset);
    let year = config.resolve_year(command.year);
    let model = config.rule_model(preset).map_err(CoreError::from)?;
    let path = command
        .output
        .clone()
        .unwrap_or_else(|| config.artifact_path(preset, year));

    if path.exists() && !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Workbook '{}' already exists. Overwrite it?",
                path.display()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Generation cancelled.");
            return Ok(());
        }
    }

    let occurrences = expand_year(&model, year)?;
    let summary = summarize(&occurrences);
    info!(%preset, year, occurrences = occurrences.len(), "expanded rule model");

    let title = format!("{}{}", preset.artifact_stem(), year);
    let mut sink = JsonWorkbookSink::new(&path, title);
    if let Some(limit) = command.row_limit {
        sink = sink.with_row_limit(limit);
    }

    let policy = if command.continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };
    let partition: fn(NaiveDate) -> PeriodKey = match command.partition {
        PartitionArg::Month => by_month,
        PartitionArg::Week => by_iso_week,
    };

    let report = Replicator::default()
        .with_policy(policy)
        .replicate(&occurrences, partition, &mut sink)
        .map_err(CoreError::from)?;

    if command.verify {
        let memory = sink.memory();
        let master = memory.view(&report.master_view).unwrap_or_default();
        for name in &report.period_views {
            let scoped = memory.view(name).unwrap_or_default();
            verify_consistency(master, scoped, partition, &PeriodKey::new(name.as_str()))
                .map_err(CoreError::from)?;
        }
    }

    let saved = sink.save()?;
    let backup = if command.backup {
        Some(snapshot_now(saved.clone(), config).await?)
    } else {
        None
    };

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let warning_style = Style::new().yellow().bold();

    println!(
        "{} Generated {} for {}: {}",
        "✓".style(success_style),
        preset.to_string().bright_white().bold(),
        year,
        saved.display().to_string().cyan()
    );
    println!(
        "  {} {} occurrences in {} + {} period views",
        "→".style(info_style),
        report.replicated,
        report.master_view,
        report.period_views.len()
    );
    if command.verify {
        println!(
            "  {} Every period view matches the master view",
            "→".style(info_style)
        );
    }
    if let Some(backup) = &backup {
        println!(
            "  {} Backup saved: {}",
            "→".style(info_style),
            backup.display().to_string().cyan()
        );
    }

    if !report.is_complete() {
        println!(
            "\n{} {} occurrences were rejected and left out of every view:",
            "Warning:".style(warning_style),
            report.failures.len()
        );
        for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("  {} {}", "•".yellow(), failure);
        }
        if report.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "  … and {} more",
                report.failures.len() - MAX_LISTED_FAILURES
            );
        }
    }

    println!();
    display_summary(&summary);
    display_views(sink.memory());

    Ok(())
}
