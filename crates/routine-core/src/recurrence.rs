use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::error::CoreError;
use crate::models::{FlexibleBlockSpec, RecurrencePattern, TaskOccurrence, TaskTemplate};
use crate::rules::{MonthOverflowPolicy, RuleModel};

/// Expands `model` over the half-open range `[start, end)`.
///
/// Dates are visited in increasing order. For each date the occurrences are
/// emitted in a fixed sub-order:
/// 1. fixed templates, in configured order
/// 2. weekly templates whose weekday matches, in configured order
/// 3. monthly templates whose day matches, in configured order
/// 4. flexible blocks `1..=N`
///
/// An empty or inverted range yields an empty sequence. The function reads
/// no clock and holds no state, so identical inputs produce identical output.
pub fn expand(model: &RuleModel, start: NaiveDate, end: NaiveDate) -> Vec<TaskOccurrence> {
    if start >= end {
        return Vec::new();
    }

    let days = (end - start).num_days() as usize;
    let mut occurrences = Vec::with_capacity(days.saturating_mul(estimated_per_day(model)));

    let mut date = start;
    while date < end {
        expand_day(model, date, &mut occurrences);
        date = date + Duration::days(1);
    }

    debug!(
        start = %start,
        end = %end,
        count = occurrences.len(),
        "expanded recurrence rules"
    );
    occurrences
}

/// Expands a single calendar month.
pub fn expand_month(model: &RuleModel, year: i32, month: u32) -> Result<Vec<TaskOccurrence>, CoreError> {
    let (start, end) = month_bounds(year, month)?;
    Ok(expand(model, start, end))
}

/// Expands a whole calendar year.
pub fn expand_year(model: &RuleModel, year: i32) -> Result<Vec<TaskOccurrence>, CoreError> {
    let (start, end) = year_bounds(year)?;
    Ok(expand(model, start, end))
}

/// `start` and the day `days` days later, for previews over a span of days.
pub fn day_range(start: NaiveDate, days: u32) -> Result<(NaiveDate, NaiveDate), CoreError> {
    let end = start
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            CoreError::InvalidRange(format!("{} days after {} is out of the supported range", days, start))
        })?;
    Ok((start, end))
}

/// First day of `month` and first day of the following month. December rolls
/// over into January of the next year.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), CoreError> {
    if !(1..=12).contains(&month) {
        return Err(CoreError::InvalidRange(format!("month {} is not in 1-12", month)));
    }
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::InvalidRange(format!("{}-{:02} is not a valid month", year, month)))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        CoreError::InvalidRange(format!("{}-{:02} is out of the supported range", next_year, next_month))
    })?;
    Ok((start, end))
}

/// `[Jan 1 year, Jan 1 year+1)`.
pub fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate), CoreError> {
    let (start, _) = month_bounds(year, 1)?;
    let (_, end) = month_bounds(year, 12)?;
    Ok((start, end))
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, CoreError> {
    let (start, end) = month_bounds(year, month)?;
    Ok((end - start).num_days() as u32)
}

fn estimated_per_day(model: &RuleModel) -> usize {
    model.fixed_templates().count()
        + model.flexible_blocks().map_or(0, |blocks| blocks.count as usize)
}

fn expand_day(model: &RuleModel, date: NaiveDate, out: &mut Vec<TaskOccurrence>) {
    for template in model.fixed_templates() {
        out.push(occurrence_from_template(model, template, date));
    }

    for template in model.weekly_templates() {
        if let RecurrencePattern::WeeklyOnWeekday(weekday) = template.pattern {
            if date.weekday() == weekday {
                out.push(occurrence_from_template(model, template, date));
            }
        }
    }

    for template in model.monthly_templates() {
        if let RecurrencePattern::MonthlyOnDay(day) = template.pattern {
            if monthly_fires_on(day, date, model.month_overflow()) {
                out.push(occurrence_from_template(model, template, date));
            }
        }
    }

    if let Some(blocks) = model.flexible_blocks() {
        for number in 1..=blocks.count {
            out.push(flexible_occurrence(model, blocks, number, date));
        }
    }
}

/// Whether a monthly template anchored to `day` fires on `date`.
///
/// With [`MonthOverflowPolicy::ClampToLastDay`] a day past the end of the
/// month fires on the month's last day instead.
pub fn monthly_fires_on(day: u32, date: NaiveDate, policy: MonthOverflowPolicy) -> bool {
    if date.day() == day {
        return true;
    }
    match policy {
        MonthOverflowPolicy::Skip => false,
        MonthOverflowPolicy::ClampToLastDay => {
            let last_day = match days_in_month(date.year(), date.month()) {
                Ok(last) => last,
                Err(_) => return false,
            };
            let clamped = day > last_day && date.day() == last_day;
            if clamped {
                debug!(day, date = %date, "clamped monthly occurrence to last day of month");
            }
            clamped
        }
    }
}

fn occurrence_from_template(model: &RuleModel, template: &TaskTemplate, date: NaiveDate) -> TaskOccurrence {
    TaskOccurrence {
        date,
        slot_label: template.pattern.slot_label().to_string(),
        duration_or_time: template.duration_or_time,
        description: template.description.clone(),
        category: template.category.clone(),
        status: model.initial_status(),
        progress: model.initial_progress(),
        priority: template.priority,
    }
}

fn flexible_occurrence(
    model: &RuleModel,
    blocks: &FlexibleBlockSpec,
    number: u32,
    date: NaiveDate,
) -> TaskOccurrence {
    TaskOccurrence {
        date,
        slot_label: FlexibleBlockSpec::slot_label(number),
        duration_or_time: blocks.duration,
        description: String::new(),
        category: blocks.category.clone(),
        status: model.initial_status(),
        progress: model.initial_progress(),
        priority: blocks.priority,
    }
}

/// Per-kind counts of an expanded sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSummary {
    pub days: usize,
    pub fixed: usize,
    pub weekly: usize,
    pub monthly: usize,
    pub flexible: usize,
}

impl ExpansionSummary {
    pub fn total(&self) -> usize {
        self.fixed + self.weekly + self.monthly + self.flexible
    }
}

pub fn summarize(occurrences: &[TaskOccurrence]) -> ExpansionSummary {
    let mut summary = ExpansionSummary::default();
    let mut last_date = None;
    for occurrence in occurrences {
        if last_date != Some(occurrence.date) {
            summary.days += 1;
            last_date = Some(occurrence.date);
        }
        match occurrence.slot_label.as_str() {
            "Fixed" => summary.fixed += 1,
            "Weekly" => summary.weekly += 1,
            "Monthly" => summary.monthly += 1,
            _ => summary.flexible += 1,
        }
    }
    summary
}
