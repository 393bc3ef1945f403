use anyhow::Result;
use owo_colors::OwoColorize;
use routine_core::error::CoreError;
use routine_core::recurrence::{day_range, expand, month_bounds, summarize};

use crate::cli::PreviewCommand;
use crate::config::Config;
use crate::parser::parse_today_relative;
use crate::views::table::{display_occurrences, display_summary};

pub fn preview_occurrences(command: PreviewCommand, config: &Config) -> Result<()> {
    let preset = config.resolve_preset(command.preset);
    let model = config.rule_model(preset).map_err(CoreError::from)?;

    let (start, end) = match command.month {
        Some(month) => month_bounds(config.resolve_year(command.year), month)?,
        None => {
            let start = parse_today_relative(command.from.as_deref().unwrap_or("today"))?;
            day_range(start, command.days)?
        }
    };

    let occurrences = expand(&model, start, end);

    println!(
        "{} {} from {} to {} (exclusive)",
        "Preview".blue().bold(),
        preset.to_string().cyan(),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );
    display_occurrences(&occurrences);
    display_summary(&summarize(&occurrences));

    Ok(())
}
