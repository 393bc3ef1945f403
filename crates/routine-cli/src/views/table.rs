use comfy_table::{Attribute, Cell, Color, Row, Table};
use routine_core::models::{TaskOccurrence, TaskPriority, TaskStatus};
use routine_core::recurrence::ExpansionSummary;
use routine_core::rules::Preset;
use routine_core::workbook::MemorySink;

pub fn display_occurrences(occurrences: &[TaskOccurrence]) {
    if occurrences.is_empty() {
        println!("No occurrences in range.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Date", "Day", "Week", "Time Block", "Time", "Task", "Category", "Status", "Priority",
    ]);

    for occurrence in occurrences {
        let mut row = Row::new();
        row.add_cell(Cell::new(occurrence.date.format("%Y-%m-%d")));
        row.add_cell(Cell::new(occurrence.weekday_name()));
        row.add_cell(Cell::new(occurrence.iso_week()));
        row.add_cell(Cell::new(&occurrence.slot_label));
        row.add_cell(Cell::new(occurrence.duration_or_time.to_string()));

        let task_cell = if occurrence.is_flexible_block() {
            Cell::new("(open)").fg(Color::DarkGrey)
        } else {
            Cell::new(&occurrence.description)
        };
        row.add_cell(task_cell);
        row.add_cell(Cell::new(occurrence.category.as_str()));

        let status_cell = Cell::new(occurrence.status.as_str());
        row.add_cell(match occurrence.status {
            TaskStatus::Completed => status_cell.fg(Color::Green),
            TaskStatus::Cancelled => status_cell
                .fg(Color::DarkGrey)
                .add_attribute(Attribute::CrossedOut),
            TaskStatus::Delayed => status_cell.fg(Color::Red),
            TaskStatus::InProgress => status_cell.fg(Color::Yellow),
            TaskStatus::NotStarted => status_cell,
        });

        let priority_cell = Cell::new(occurrence.priority.as_str());
        row.add_cell(match occurrence.priority {
            TaskPriority::High => priority_cell.fg(Color::Red).add_attribute(Attribute::Bold),
            TaskPriority::Medium => priority_cell.fg(Color::Yellow),
            TaskPriority::Low => priority_cell.fg(Color::Green),
        });

        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_summary(summary: &ExpansionSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Days", "Fixed", "Weekly", "Monthly", "Flexible", "Total"]);
    table.add_row(vec![
        summary.days,
        summary.fixed,
        summary.weekly,
        summary.monthly,
        summary.flexible,
        summary.total(),
    ]);
    println!("{table}");
}

/// Row counts of every view, master first.
pub fn display_views(sink: &MemorySink) {
    let mut table = Table::new();
    table.set_header(vec!["View", "Rows"]);
    for (index, (name, rows)) in sink.views().enumerate() {
        let name_cell = if index == 0 {
            Cell::new(name).add_attribute(Attribute::Bold)
        } else {
            Cell::new(name)
        };
        table.add_row(vec![name_cell, Cell::new(rows.len())]);
    }
    println!("{table}");
}

pub fn display_presets() {
    let mut table = Table::new();
    table.set_header(vec![
        "Preset", "Categories", "Templates", "Flexible Blocks", "Statuses", "Workbook",
    ]);

    for preset in Preset::ALL {
        let mut row = Row::new();
        row.add_cell(Cell::new(preset.to_string()).add_attribute(Attribute::Bold));
        match preset.rule_model() {
            Ok(model) => {
                row.add_cell(Cell::new(model.categories().names().join(", ")));
                row.add_cell(Cell::new(model.templates().len()));
                row.add_cell(Cell::new(
                    model
                        .flexible_blocks()
                        .map(|blocks| format!("{} x {}", blocks.count, blocks.duration))
                        .unwrap_or_else(|| "None".to_string()),
                ));
                row.add_cell(Cell::new(
                    model
                        .status_vocabulary()
                        .values()
                        .iter()
                        .map(|status| status.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ));
            }
            Err(e) => {
                row.add_cell(Cell::new(e.to_string()).fg(Color::Red));
            }
        }
        row.add_cell(Cell::new(format!("{}<year>.json", preset.artifact_stem())));
        table.add_row(row);
    }

    println!("{table}");
}
