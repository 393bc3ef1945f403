//! Concrete sinks and the persisted workbook artifact.
//!
//! [`MemorySink`] keeps views in memory and can enforce a per-view row limit.
//! [`JsonWorkbookSink`] wraps it and persists every view as one sheet of a
//! JSON workbook file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CoreError, SinkRejection};
use crate::models::TaskOccurrence;
use crate::replication::{Sink, ViewHandle};

/// Rows a view held in the spreadsheet layout (`E2:E1000`).
pub const LEGACY_SHEET_ROW_LIMIT: usize = 999;

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    views: Vec<(String, Vec<TaskOccurrence>)>,
    row_limit: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects appends to a view that already holds `limit` rows.
    pub fn with_row_limit(limit: usize) -> Self {
        Self {
            views: Vec::new(),
            row_limit: Some(limit),
        }
    }

    pub fn view(&self, name: &str) -> Option<&[TaskOccurrence]> {
        self.views
            .iter()
            .find(|(view, _)| view == name)
            .map(|(_, rows)| rows.as_slice())
    }

    /// View names in creation order.
    pub fn view_names(&self) -> Vec<&str> {
        self.views.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn views(&self) -> impl Iterator<Item = (&str, &[TaskOccurrence])> {
        self.views.iter().map(|(name, rows)| (name.as_str(), rows.as_slice()))
    }

    fn rows_mut(&mut self, view: &ViewHandle) -> Result<&mut Vec<TaskOccurrence>, SinkRejection> {
        match self.views.get_mut(view.id()) {
            Some((name, rows)) if name.as_str() == view.name() => Ok(rows),
            _ => Err(SinkRejection::new(format!("unknown view '{}'", view.name()))),
        }
    }
}

impl Sink for MemorySink {
    fn create_view(&mut self, name: &str) -> ViewHandle {
        if let Some(id) = self.views.iter().position(|(view, _)| view == name) {
            return ViewHandle::new(id, name);
        }
        self.views.push((name.to_string(), Vec::new()));
        ViewHandle::new(self.views.len() - 1, name)
    }

    fn append_occurrence(&mut self, view: &ViewHandle, occurrence: &TaskOccurrence) -> Result<(), SinkRejection> {
        let limit = self.row_limit;
        let rows = self.rows_mut(view)?;
        if let Some(limit) = limit {
            if rows.len() >= limit {
                return Err(SinkRejection::new(format!(
                    "view '{}' is full ({} rows)",
                    view.name(),
                    limit
                )));
            }
        }
        rows.push(occurrence.clone());
        Ok(())
    }

    fn retract_last(&mut self, view: &ViewHandle) -> Result<(), SinkRejection> {
        let rows = self.rows_mut(view)?;
        rows.pop()
            .map(|_| ())
            .ok_or_else(|| SinkRejection::new(format!("view '{}' is empty", view.name())))
    }
}

// ============================================================================
// Persisted workbook
// ============================================================================

/// One row of a sheet, flattened to the columns of the task sheets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkbookRow {
    pub date: String,
    pub day: String,
    pub week: u32,
    pub time_block: String,
    pub duration: String,
    pub task_description: String,
    pub category: String,
    pub status: String,
    pub progress: String,
    pub priority: String,
    #[serde(default)]
    pub notes: String,
}

impl From<&TaskOccurrence> for WorkbookRow {
    fn from(occurrence: &TaskOccurrence) -> Self {
        Self {
            date: occurrence.date.format("%Y-%m-%d").to_string(),
            day: occurrence.weekday_name().to_string(),
            week: occurrence.iso_week(),
            time_block: occurrence.slot_label.clone(),
            duration: occurrence.duration_or_time.to_string(),
            task_description: occurrence.description.clone(),
            category: occurrence.category.to_string(),
            status: occurrence.status.to_string(),
            progress: occurrence.progress.to_string(),
            priority: occurrence.priority.to_string(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<WorkbookRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workbook {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook, CoreError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// A [`MemorySink`] that can be saved as a single workbook file.
#[derive(Debug)]
pub struct JsonWorkbookSink {
    path: PathBuf,
    title: String,
    inner: MemorySink,
}

impl JsonWorkbookSink {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            inner: MemorySink::new(),
        }
    }

    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.inner.row_limit = Some(limit);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn memory(&self) -> &MemorySink {
        &self.inner
    }

    pub fn to_workbook(&self, generated_at: DateTime<Utc>) -> Workbook {
        Workbook {
            title: self.title.clone(),
            generated_at,
            sheets: self
                .inner
                .views()
                .map(|(name, rows)| Sheet {
                    name: name.to_string(),
                    rows: rows.iter().map(WorkbookRow::from).collect(),
                })
                .collect(),
        }
    }

    /// Writes the workbook to a staging file next to its final path, then
    /// renames it into place.
    pub fn save(&self) -> Result<PathBuf, CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let workbook = self.to_workbook(Utc::now());
        let staging = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            serde_json::to_writer_pretty(&mut writer, &workbook)?;
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)?;

        info!(
            path = %self.path.display(),
            sheets = workbook.sheets.len(),
            "workbook saved"
        );
        Ok(self.path.clone())
    }
}

impl Sink for JsonWorkbookSink {
    fn create_view(&mut self, name: &str) -> ViewHandle {
        self.inner.create_view(name)
    }

    fn append_occurrence(&mut self, view: &ViewHandle, occurrence: &TaskOccurrence) -> Result<(), SinkRejection> {
        self.inner.append_occurrence(view, occurrence)
    }

    fn retract_last(&mut self, view: &ViewHandle) -> Result<(), SinkRejection> {
        self.inner.retract_last(view)
    }
}
