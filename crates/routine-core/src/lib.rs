//! # Routine Core Library
//!
//! Generates a year of scheduled task occurrences from a small set of
//! recurrence rules, replicates them into a master view and per-period views,
//! and keeps daily backups of the persisted workbook.
//!
//! ## Features
//!
//! - **Rule Model**: Validated task templates with fixed, weekly and monthly
//!   recurrence plus flexible time blocks
//! - **Deterministic Expansion**: Day-by-day calendar walk with a stable
//!   per-day ordering
//! - **Consistent Replication**: Every occurrence lands in the master view and
//!   in exactly one period view, in the same order
//! - **Daily Backups**: A wall-clock scheduler that arms, fires, and re-arms
//!   without ever overlapping snapshots
//!
//! ## Core Modules
//!
//! - [`models`]: Statuses, priorities, categories and occurrences
//! - [`rules`]: Rule model configuration, validation and presets
//! - [`recurrence`]: Calendar expansion engine
//! - [`replication`]: Master and per-period views over an abstract [`replication::Sink`]
//! - [`workbook`]: In-memory and JSON workbook sinks
//! - [`backup`]: Daily snapshot scheduler
//! - [`timezone`]: Timezone utilities and validation
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use routine_core::{
//!     recurrence::expand_year,
//!     replication::{by_month, Replicator},
//!     rules::Preset,
//!     workbook::JsonWorkbookSink,
//! };
//!
//! fn main() -> Result<(), routine_core::error::CoreError> {
//!     let model = Preset::TaskManager.rule_model()?;
//!     let occurrences = expand_year(&model, 2025)?;
//!
//!     let mut sink = JsonWorkbookSink::new("TaskManager2025.json", "Task Manager 2025");
//!     let report = Replicator::default().replicate(&occurrences, by_month, &mut sink)?;
//!     println!("Replicated {} occurrences", report.replicated);
//!
//!     sink.save()?;
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod replication;
pub mod rules;
pub mod timezone;
pub mod workbook;
