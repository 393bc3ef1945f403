use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ConfigurationError;

// ============================================================================
// Closed enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Delayed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Delayed => "Delayed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "not started" | "not_started" => Ok(TaskStatus::NotStarted),
            "in progress" | "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "delayed" => Ok(TaskStatus::Delayed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

/// Which status values a deployment allows.
///
/// The general-routine workbook only tracks the first three; the task-manager
/// workbook adds `Delayed` and `Cancelled`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusVocabulary {
    #[default]
    Basic,
    Extended,
}

impl StatusVocabulary {
    pub fn values(&self) -> &'static [TaskStatus] {
        match self {
            StatusVocabulary::Basic => &[
                TaskStatus::NotStarted,
                TaskStatus::InProgress,
                TaskStatus::Completed,
            ],
            StatusVocabulary::Extended => &[
                TaskStatus::NotStarted,
                TaskStatus::InProgress,
                TaskStatus::Completed,
                TaskStatus::Delayed,
                TaskStatus::Cancelled,
            ],
        }
    }

    pub fn contains(&self, status: TaskStatus) -> bool {
        self.values().contains(&status)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Progress {
    #[default]
    Pending,
    Done,
}

impl Progress {
    pub const ALL: [Progress; 2] = [Progress::Pending, Progress::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Progress::Pending => "Pending",
            Progress::Done => "Done",
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid progress value: {0}")]
pub struct ParseProgressError(String);

impl FromStr for Progress {
    type Err = ParseProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Progress::Pending),
            "done" => Ok(Progress::Done),
            _ => Err(ParseProgressError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::High, TaskPriority::Medium, TaskPriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "High",
            TaskPriority::Medium => "Medium",
            TaskPriority::Low => "Low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

// ============================================================================
// Categories
// ============================================================================

/// A category drawn from a [`CategoryVocabulary`]. Only the vocabulary can
/// create one, so an occurrence can never carry free text here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free set of category names for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryVocabulary {
    names: Vec<String>,
}

impl CategoryVocabulary {
    pub fn new<I, S>(names: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if collected.iter().any(|existing| existing == &name) {
                return Err(ConfigurationError::DuplicateCategory(name));
            }
            collected.push(name);
        }
        if collected.is_empty() {
            return Err(ConfigurationError::EmptyCategories);
        }
        Ok(Self { names: collected })
    }

    /// Looks up a category by exact name. Matching is case-sensitive because
    /// the names are written verbatim into the workbook.
    pub fn resolve(&self, name: &str) -> Option<Category> {
        self.names
            .iter()
            .find(|candidate| candidate.as_str() == name.trim())
            .map(|found| Category(found.clone()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// Durations and clock times
// ============================================================================

/// Either the clock time a task is due ("09:00") or how long a block lasts
/// ("2:00").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationOrTime {
    ClockTime(NaiveTime),
    Duration { minutes: u32 },
}

impl DurationOrTime {
    /// Parses an `HH:MM` wall-clock time.
    pub fn parse_time(s: &str) -> Result<Self, ConfigurationError> {
        let (hours, minutes) = split_hh_mm(s)?;
        NaiveTime::from_hms_opt(hours, minutes, 0)
            .map(DurationOrTime::ClockTime)
            .ok_or_else(|| ConfigurationError::InvalidDurationOrTime(s.to_string()))
    }

    /// Parses an `H:MM` duration. Hours are unbounded.
    pub fn parse_duration(s: &str) -> Result<Self, ConfigurationError> {
        let (hours, minutes) = split_hh_mm(s)?;
        if minutes >= 60 {
            return Err(ConfigurationError::InvalidDurationOrTime(s.to_string()));
        }
        Ok(DurationOrTime::Duration {
            minutes: hours * 60 + minutes,
        })
    }

    pub fn minutes(minutes: u32) -> Self {
        DurationOrTime::Duration { minutes }
    }

    pub fn is_clock_time(&self) -> bool {
        matches!(self, DurationOrTime::ClockTime(_))
    }
}

fn split_hh_mm(s: &str) -> Result<(u32, u32), ConfigurationError> {
    let invalid = || ConfigurationError::InvalidDurationOrTime(s.to_string());
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || m.len() != 2 {
        return Err(invalid());
    }
    let hours = h.parse::<u32>().map_err(|_| invalid())?;
    let minutes = m.parse::<u32>().map_err(|_| invalid())?;
    Ok((hours, minutes))
}

impl fmt::Display for DurationOrTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationOrTime::ClockTime(time) => {
                write!(f, "{:02}:{:02}", time.hour(), time.minute())
            }
            DurationOrTime::Duration { minutes } => {
                write!(f, "{}:{:02}", minutes / 60, minutes % 60)
            }
        }
    }
}

impl Serialize for DurationOrTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Templates and patterns
// ============================================================================

/// How often a template materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePattern {
    Fixed,
    WeeklyOnWeekday(Weekday),
    /// Day of month, 1-31.
    MonthlyOnDay(u32),
}

impl RecurrencePattern {
    /// Text written to the "Time Block" column.
    pub fn slot_label(&self) -> &'static str {
        match self {
            RecurrencePattern::Fixed => "Fixed",
            RecurrencePattern::WeeklyOnWeekday(_) => "Weekly",
            RecurrencePattern::MonthlyOnDay(_) => "Monthly",
        }
    }
}

/// Immutable task definition bound to one recurrence pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    pub description: String,
    pub category: Category,
    pub priority: TaskPriority,
    pub duration_or_time: DurationOrTime,
    pub pattern: RecurrencePattern,
}

/// Unnamed, user-assignable time slots generated every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexibleBlockSpec {
    pub count: u32,
    pub duration: DurationOrTime,
    pub category: Category,
    pub priority: TaskPriority,
}

impl FlexibleBlockSpec {
    pub fn slot_label(number: u32) -> String {
        format!("Flexible Block {}", number)
    }
}

// ============================================================================
// Occurrences
// ============================================================================

/// One concrete task on one date, as written to every view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOccurrence {
    pub date: NaiveDate,
    pub slot_label: String,
    pub duration_or_time: DurationOrTime,
    /// Empty for flexible blocks.
    pub description: String,
    pub category: Category,
    pub status: TaskStatus,
    pub progress: Progress,
    pub priority: TaskPriority,
}

impl TaskOccurrence {
    /// English weekday name, e.g. "Monday".
    pub fn weekday_name(&self) -> &'static str {
        weekday_name(self.date.weekday())
    }

    /// ISO-8601 week number of the occurrence date.
    pub fn iso_week(&self) -> u32 {
        self.date.iso_week().week()
    }

    pub fn is_flexible_block(&self) -> bool {
        self.description.is_empty()
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
