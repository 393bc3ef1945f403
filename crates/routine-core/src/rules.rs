//! Recurrence rule model.
//!
//! A [`RuleModel`] is built once from a [`RuleModelConfig`] and is read-only
//! for the lifetime of a generation run. Every value that ends up in a view
//! (category, priority, status, progress) is checked against its closed
//! vocabulary here, so the expansion engine never sees free text.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ConfigurationError;
use crate::models::{
    CategoryVocabulary, DurationOrTime, FlexibleBlockSpec, Progress, RecurrencePattern,
    StatusVocabulary, TaskPriority, TaskStatus, TaskTemplate,
};

/// What to do with a monthly template whose day does not exist in a month
/// (day 31 in April, day 30 in February).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MonthOverflowPolicy {
    /// Emit the occurrence on the last day of the short month.
    #[default]
    ClampToLastDay,
    /// Emit nothing for that month.
    Skip,
}

// ============================================================================
// Raw configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecurrenceConfig {
    #[default]
    Fixed,
    /// `weekday` uses 0 = Monday .. 6 = Sunday.
    Weekly { weekday: u8 },
    Monthly { day: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateConfig {
    pub description: String,
    pub category: String,
    pub priority: String,
    /// Wall-clock due time, `HH:MM`.
    #[serde(default)]
    pub time: Option<String>,
    /// Block length, `H:MM`.
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub recurrence: RecurrenceConfig,
}

/// Most flexible blocks a single day may hold.
pub const MAX_FLEXIBLE_BLOCKS: u32 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlexibleBlockConfig {
    pub count: u32,
    pub duration: String,
    pub category: String,
    #[serde(default = "default_flexible_priority")]
    pub priority: String,
}

fn default_flexible_priority() -> String {
    TaskPriority::Medium.to_string()
}

fn default_initial_status() -> String {
    TaskStatus::NotStarted.to_string()
}

fn default_initial_progress() -> String {
    Progress::Pending.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleModelConfig {
    pub categories: Vec<String>,
    #[serde(default)]
    pub status_vocabulary: StatusVocabulary,
    #[serde(default = "default_initial_status")]
    pub initial_status: String,
    #[serde(default = "default_initial_progress")]
    pub initial_progress: String,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
    #[serde(default)]
    pub flexible_blocks: Option<FlexibleBlockConfig>,
    #[serde(default)]
    pub month_overflow: MonthOverflowPolicy,
}

// ============================================================================
// Validated model
// ============================================================================

/// Validated, immutable set of recurrence rules plus the closed vocabularies
/// they draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleModel {
    categories: CategoryVocabulary,
    status_vocabulary: StatusVocabulary,
    initial_status: TaskStatus,
    initial_progress: Progress,
    templates: Vec<TaskTemplate>,
    flexible_blocks: Option<FlexibleBlockSpec>,
    month_overflow: MonthOverflowPolicy,
}

impl RuleModel {
    /// Validates `config` and builds the model.
    ///
    /// Fails on the first template that names an unknown category, an
    /// out-of-range weekday or day of month, an unknown priority, or a
    /// malformed time. The initial status must belong to the configured
    /// status vocabulary.
    pub fn new(config: RuleModelConfig) -> Result<Self, ConfigurationError> {
        let categories = CategoryVocabulary::new(config.categories)?;

        let initial_status = parse_enum::<TaskStatus>("status", &config.initial_status)?;
        if !config.status_vocabulary.contains(initial_status) {
            return Err(ConfigurationError::StatusNotInVocabulary(config.initial_status));
        }
        let initial_progress = parse_enum::<Progress>("progress", &config.initial_progress)?;

        let templates = config
            .templates
            .into_iter()
            .map(|template| build_template(&categories, template))
            .collect::<Result<Vec<_>, _>>()?;

        let flexible_blocks = config
            .flexible_blocks
            .map(|blocks| build_flexible_blocks(&categories, blocks))
            .transpose()?;

        Ok(Self {
            categories,
            status_vocabulary: config.status_vocabulary,
            initial_status,
            initial_progress,
            templates,
            flexible_blocks,
            month_overflow: config.month_overflow,
        })
    }

    pub fn categories(&self) -> &CategoryVocabulary {
        &self.categories
    }

    pub fn status_vocabulary(&self) -> StatusVocabulary {
        self.status_vocabulary
    }

    pub fn initial_status(&self) -> TaskStatus {
        self.initial_status
    }

    pub fn initial_progress(&self) -> Progress {
        self.initial_progress
    }

    /// All templates in configured order.
    pub fn templates(&self) -> &[TaskTemplate] {
        &self.templates
    }

    pub fn fixed_templates(&self) -> impl Iterator<Item = &TaskTemplate> {
        self.templates
            .iter()
            .filter(|t| matches!(t.pattern, RecurrencePattern::Fixed))
    }

    pub fn weekly_templates(&self) -> impl Iterator<Item = &TaskTemplate> {
        self.templates
            .iter()
            .filter(|t| matches!(t.pattern, RecurrencePattern::WeeklyOnWeekday(_)))
    }

    pub fn monthly_templates(&self) -> impl Iterator<Item = &TaskTemplate> {
        self.templates
            .iter()
            .filter(|t| matches!(t.pattern, RecurrencePattern::MonthlyOnDay(_)))
    }

    pub fn flexible_blocks(&self) -> Option<&FlexibleBlockSpec> {
        self.flexible_blocks.as_ref()
    }

    pub fn month_overflow(&self) -> MonthOverflowPolicy {
        self.month_overflow
    }
}

fn parse_enum<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigurationError> {
    value
        .parse::<T>()
        .map_err(|_| ConfigurationError::InvalidEnumValue {
            field,
            value: value.to_string(),
        })
}

fn build_template(
    categories: &CategoryVocabulary,
    config: TemplateConfig,
) -> Result<TaskTemplate, ConfigurationError> {
    if config.description.trim().is_empty() {
        return Err(ConfigurationError::EmptyDescription);
    }

    let category = categories
        .resolve(&config.category)
        .ok_or_else(|| ConfigurationError::UnknownCategory {
            task: config.description.clone(),
            category: config.category.clone(),
        })?;
    let priority = parse_enum::<TaskPriority>("priority", &config.priority)?;

    let duration_or_time = match (&config.time, &config.duration) {
        (Some(time), None) => DurationOrTime::parse_time(time)?,
        (None, Some(duration)) => DurationOrTime::parse_duration(duration)?,
        _ => {
            return Err(ConfigurationError::AmbiguousDurationOrTime(
                config.description.clone(),
            ))
        }
    };

    let pattern = match config.recurrence {
        RecurrenceConfig::Fixed => RecurrencePattern::Fixed,
        RecurrenceConfig::Weekly { weekday } => {
            RecurrencePattern::WeeklyOnWeekday(weekday_from_index(weekday)?)
        }
        RecurrenceConfig::Monthly { day } => {
            if !(1..=31).contains(&day) {
                return Err(ConfigurationError::DayOfMonthOutOfRange(day));
            }
            RecurrencePattern::MonthlyOnDay(u32::from(day))
        }
    };

    Ok(TaskTemplate {
        description: config.description,
        category,
        priority,
        duration_or_time,
        pattern,
    })
}

fn build_flexible_blocks(
    categories: &CategoryVocabulary,
    config: FlexibleBlockConfig,
) -> Result<FlexibleBlockSpec, ConfigurationError> {
    let category = categories
        .resolve(&config.category)
        .ok_or_else(|| ConfigurationError::UnknownCategory {
            task: "Flexible Block".to_string(),
            category: config.category.clone(),
        })?;
    if config.count > MAX_FLEXIBLE_BLOCKS {
        return Err(ConfigurationError::TooManyFlexibleBlocks {
            count: config.count,
            max: MAX_FLEXIBLE_BLOCKS,
        });
    }
    Ok(FlexibleBlockSpec {
        count: config.count,
        duration: DurationOrTime::parse_duration(&config.duration)?,
        category,
        priority: parse_enum::<TaskPriority>("priority", &config.priority)?,
    })
}

/// Maps 0 = Monday .. 6 = Sunday onto [`Weekday`].
pub fn weekday_from_index(index: u8) -> Result<Weekday, ConfigurationError> {
    match index {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(ConfigurationError::WeekdayOutOfRange(other)),
    }
}

// ============================================================================
// Presets
// ============================================================================

/// Built-in deployments. Each carries its own category vocabulary and task
/// list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Work-oriented task manager: daily, Monday and first-of-month tasks.
    TaskManager,
    /// Personal routine: fixed study/life blocks plus flexible blocks.
    #[default]
    GeneralRoutine,
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown preset: {0} (expected 'task-manager' or 'general-routine')")]
pub struct ParsePresetError(String);

impl FromStr for Preset {
    type Err = ParsePresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "task-manager" | "task_manager" => Ok(Preset::TaskManager),
            "general-routine" | "general_routine" | "routine" => Ok(Preset::GeneralRoutine),
            _ => Err(ParsePresetError(s.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::TaskManager => f.write_str("task-manager"),
            Preset::GeneralRoutine => f.write_str("general-routine"),
        }
    }
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::TaskManager, Preset::GeneralRoutine];

    /// File stem of the persisted workbook; the year is appended.
    pub fn artifact_stem(&self) -> &'static str {
        match self {
            Preset::TaskManager => "Task_Management_",
            Preset::GeneralRoutine => "TaskManager",
        }
    }

    pub fn config(&self) -> RuleModelConfig {
        match self {
            Preset::TaskManager => task_manager_config(),
            Preset::GeneralRoutine => general_routine_config(),
        }
    }

    pub fn rule_model(&self) -> Result<RuleModel, ConfigurationError> {
        RuleModel::new(self.config())
    }
}

fn timed(
    description: &str,
    priority: &str,
    category: &str,
    time: &str,
    recurrence: RecurrenceConfig,
) -> TemplateConfig {
    TemplateConfig {
        description: description.to_string(),
        category: category.to_string(),
        priority: priority.to_string(),
        time: Some(time.to_string()),
        duration: None,
        recurrence,
    }
}

fn block(description: &str, category: &str, duration: &str, priority: &str) -> TemplateConfig {
    TemplateConfig {
        description: description.to_string(),
        category: category.to_string(),
        priority: priority.to_string(),
        time: None,
        duration: Some(duration.to_string()),
        recurrence: RecurrenceConfig::Fixed,
    }
}

fn task_manager_config() -> RuleModelConfig {
    use RecurrenceConfig::{Fixed, Monthly, Weekly};
    let monday = Weekly { weekday: 0 };
    let first = Monthly { day: 1 };

    RuleModelConfig {
        categories: ["Work", "Personal", "Health", "Family", "Finance", "Education", "Other"]
            .map(String::from)
            .to_vec(),
        status_vocabulary: StatusVocabulary::Extended,
        initial_status: default_initial_status(),
        initial_progress: default_initial_progress(),
        templates: vec![
            timed("Daily Team Standup", "High", "Work", "09:00", Fixed),
            timed("Check Emails", "Medium", "Work", "09:30", Fixed),
            timed("Review Tasks", "Medium", "Work", "17:00", Fixed),
            timed("Team Meeting", "High", "Work", "14:00", monday.clone()),
            timed("Weekly Report", "High", "Work", "16:00", monday.clone()),
            timed("Planning Session", "Medium", "Work", "10:00", monday),
            timed("Monthly Review", "High", "Work", "15:00", first.clone()),
            timed("Budget Update", "High", "Finance", "11:00", first.clone()),
            timed("Team Assessment", "Medium", "Work", "14:00", first),
        ],
        flexible_blocks: None,
        month_overflow: MonthOverflowPolicy::default(),
    }
}

fn general_routine_config() -> RuleModelConfig {
    RuleModelConfig {
        categories: [
            "Core Learning",
            "Personal Development",
            "Essential Activities",
            "Flexible Tasks",
            "Project Work",
            "Health & Wellness",
            "Meetings/Collaboration",
            "Research & Study",
        ]
        .map(String::from)
        .to_vec(),
        status_vocabulary: StatusVocabulary::Basic,
        initial_status: default_initial_status(),
        initial_progress: default_initial_progress(),
        templates: vec![
            block("Project work", "Core Learning", "2:00", "High"),
            block("Cybersecurity practice", "Core Learning", "2:00", "High"),
            block("Reading/revision of slides", "Core Learning", "3:00", "High"),
            block("Huawei practice", "Core Learning", "1:00", "High"),
            block("90 day python", "Core Learning", "0:30", "High"),
            block("Reading self-help books", "Personal Development", "1:00", "Medium"),
            block("Reading the bible", "Personal Development", "0:30", "Medium"),
            block("Duolingo and typing practice", "Personal Development", "0:10", "Medium"),
            block("Sleep", "Essential Activities", "5:00", "High"),
            block("Meals", "Essential Activities", "1:30", "High"),
            block("Personal care", "Essential Activities", "1:00", "High"),
            block("Rest/break periods", "Essential Activities", "2:00", "Medium"),
        ],
        flexible_blocks: Some(FlexibleBlockConfig {
            count: 3,
            duration: "2:00".to_string(),
            category: "Flexible Tasks".to_string(),
            priority: default_flexible_priority(),
        }),
        month_overflow: MonthOverflowPolicy::default(),
    }
}
