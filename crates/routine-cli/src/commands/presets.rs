use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config::CONFIG_FILE;
use crate::views::table::display_presets;

pub fn list_presets() -> Result<()> {
    println!("{}", "Built-in presets".blue().bold());
    display_presets();
    println!(
        "Select one with --preset or `preset = \"...\"` in {}; a [rules] table there replaces it.",
        CONFIG_FILE.cyan()
    );
    Ok(())
}
