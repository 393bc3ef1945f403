use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Raised while building a [`crate::rules::RuleModel`]. Fatal: no generation
/// run may start until the configuration is fixed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Task '{task}' references unknown category '{category}'")]
    UnknownCategory { task: String, category: String },

    #[error("Weekday {0} is out of range (expected 0-6, Monday = 0)")]
    WeekdayOutOfRange(u8),

    #[error("Day of month {0} is out of range (expected 1-31)")]
    DayOfMonthOutOfRange(u8),

    #[error("Invalid {field} value: '{value}'")]
    InvalidEnumValue { field: &'static str, value: String },

    #[error("Initial status '{0}' is not part of the configured status vocabulary")]
    StatusNotInVocabulary(String),

    #[error("Invalid duration or time '{0}' (expected H:MM or HH:MM)")]
    InvalidDurationOrTime(String),

    #[error("Task '{0}' must set exactly one of `time` or `duration`")]
    AmbiguousDurationOrTime(String),

    #[error("Category vocabulary is empty")]
    EmptyCategories,

    #[error("Category '{0}' is listed more than once")]
    DuplicateCategory(String),

    #[error("Task description must not be empty")]
    EmptyDescription,

    #[error("{count} flexible blocks per day is too many (at most {max})")]
    TooManyFlexibleBlocks { count: u32, max: u32 },
}

/// A single occurrence could not be written to a view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to write occurrence #{index} ({date} '{description}') to view '{view}': {reason}")]
pub struct SinkWriteError {
    /// Name of the view that rejected the write.
    pub view: String,
    /// Position of the occurrence in the emitted sequence.
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub reason: String,
}

/// Why a sink refused an operation. The replication layer turns this into a
/// [`SinkWriteError`] naming the view and the occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct SinkRejection {
    pub reason: String,
}

impl SinkRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// A snapshot of the persisted artifact failed. Never fatal to the scheduler.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup source '{0}' does not exist")]
    SourceMissing(PathBuf),

    #[error("Backup source '{0}' has no file name")]
    InvalidSource(PathBuf),

    #[error("Failed to copy '{from}' to '{to}'")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create backup directory '{path}'")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

/// Replication stopped after a rejected write. Every view holds exactly the
/// first `committed` occurrences that belong to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    #[error("Replication aborted after {committed} occurrences: {error}")]
    Aborted {
        committed: usize,
        #[source]
        error: SinkWriteError,
    },

    #[error("Could not roll back view '{view}' after a failed write: {reason}")]
    Inconsistent { view: String, reason: String },

    #[error("Period view '{0}' has the same name as the master view")]
    ViewNameConflict(String),

    #[error("View '{view}' diverges from the master view at position {position}")]
    Diverged { view: String, position: usize },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{0}")]
    SinkWrite(#[from] SinkWriteError),

    #[error("{0}")]
    Replication(#[from] ReplicationError),

    #[error("Backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}
