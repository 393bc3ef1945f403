//! Fan-out of an occurrence stream into named views.
//!
//! Every occurrence is written to the master view and to the view of its
//! period. Views only filter the stream, so the master view restricted to a
//! period is element-wise equal to that period's view. When a sink rejects
//! one half of a dual write, the half that succeeded is retracted so all views
//! stay on the same prefix.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

use crate::error::{ReplicationError, SinkRejection, SinkWriteError};
use crate::models::TaskOccurrence;

/// Default name of the view holding the whole, unpartitioned sequence.
pub const MASTER_VIEW: &str = "Yearly";

/// Opaque reference to a view created by a [`Sink`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewHandle {
    id: usize,
    name: String,
}

impl ViewHandle {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Destination for occurrences, organized in named views.
pub trait Sink {
    /// Returns the handle for `name`, creating the view if needed. Creating a
    /// view twice yields the same handle.
    fn create_view(&mut self, name: &str) -> ViewHandle;

    fn append_occurrence(
        &mut self,
        view: &ViewHandle,
        occurrence: &TaskOccurrence,
    ) -> Result<(), SinkRejection>;

    /// Removes the most recently appended occurrence from `view`.
    fn retract_last(&mut self, view: &ViewHandle) -> Result<(), SinkRejection>;
}

/// Key naming the view a date belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Partitions by English month name ("January"). Intended for year-long
/// runs: the same month of two different years lands in one view.
pub fn by_month(date: NaiveDate) -> PeriodKey {
    PeriodKey::new(MONTH_NAMES[date.month0() as usize])
}

/// Partitions by ISO week, e.g. "2025-W01".
pub fn by_iso_week(date: NaiveDate) -> PeriodKey {
    let week = date.iso_week();
    PeriodKey::new(format!("{}-W{:02}", week.year(), week.week()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first rejected write.
    #[default]
    Abort,
    /// Record the rejected occurrence, keep it out of every view, and go on.
    Continue,
}

/// Outcome of a replication run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    pub master_view: String,
    /// Period views in first-seen order.
    pub period_views: Vec<String>,
    /// Occurrences present in both the master view and their period view.
    pub replicated: usize,
    /// Occurrences that were rejected and kept out of every view.
    pub failures: Vec<SinkWriteError>,
}

impl ReplicationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Replicator {
    master_view: String,
    policy: FailurePolicy,
}

impl Default for Replicator {
    fn default() -> Self {
        Self::new(MASTER_VIEW)
    }
}

impl Replicator {
    pub fn new(master_view: impl Into<String>) -> Self {
        Self {
            master_view: master_view.into(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn master_view(&self) -> &str {
        &self.master_view
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Writes `occurrences` to the master view and to one view per period.
    ///
    /// Period keys are computed for the whole sequence before anything is
    /// written, and all views are created up front in first-seen order.
    /// Emission order is preserved in every view.
    pub fn replicate<S, P>(
        &self,
        occurrences: &[TaskOccurrence],
        partition: P,
        sink: &mut S,
    ) -> Result<ReplicationReport, ReplicationError>
    where
        S: Sink + ?Sized,
        P: Fn(NaiveDate) -> PeriodKey,
    {
        let keys: Vec<PeriodKey> = occurrences.iter().map(|o| partition(o.date)).collect();

        let mut period_order: Vec<&PeriodKey> = Vec::new();
        for key in &keys {
            if key.label() == self.master_view {
                return Err(ReplicationError::ViewNameConflict(key.label().to_string()));
            }
            if !period_order.contains(&key) {
                period_order.push(key);
            }
        }

        let master = sink.create_view(&self.master_view);
        let mut period_views: HashMap<&PeriodKey, ViewHandle> = HashMap::with_capacity(period_order.len());
        for key in &period_order {
            period_views.insert(*key, sink.create_view(key.label()));
        }

        let mut report = ReplicationReport {
            master_view: self.master_view.clone(),
            period_views: period_order.iter().map(|k| k.label().to_string()).collect(),
            replicated: 0,
            failures: Vec::new(),
        };

        for (index, (occurrence, key)) in occurrences.iter().zip(&keys).enumerate() {
            let period = &period_views[key];
            match write_all(sink, [&master, period], index, occurrence)? {
                None => report.replicated += 1,
                Some(error) => {
                    warn!(%error, "occurrence rejected by sink");
                    match self.policy {
                        FailurePolicy::Abort => {
                            return Err(ReplicationError::Aborted {
                                committed: report.replicated,
                                error,
                            })
                        }
                        FailurePolicy::Continue => report.failures.push(error),
                    }
                }
            }
        }

        info!(
            master = %report.master_view,
            views = report.period_views.len(),
            replicated = report.replicated,
            failures = report.failures.len(),
            "replication finished"
        );
        Ok(report)
    }
}

/// Appends `occurrence` to every target. On rejection, retracts it from the
/// targets that already accepted it and returns the rejection.
fn write_all<S: Sink + ?Sized, const N: usize>(
    sink: &mut S,
    targets: [&ViewHandle; N],
    index: usize,
    occurrence: &TaskOccurrence,
) -> Result<Option<SinkWriteError>, ReplicationError> {
    for (position, target) in targets.iter().enumerate() {
        if let Err(rejection) = sink.append_occurrence(target, occurrence) {
            for written in targets[..position].iter().rev() {
                sink.retract_last(written)
                    .map_err(|undo| ReplicationError::Inconsistent {
                        view: written.name().to_string(),
                        reason: undo.reason,
                    })?;
            }
            return Ok(Some(SinkWriteError {
                view: target.name().to_string(),
                index,
                date: occurrence.date,
                description: describe(occurrence),
                reason: rejection.reason,
            }));
        }
    }
    Ok(None)
}

fn describe(occurrence: &TaskOccurrence) -> String {
    if occurrence.description.is_empty() {
        occurrence.slot_label.clone()
    } else {
        occurrence.description.clone()
    }
}

/// Checks that the master view restricted to `key` equals `scoped`, element by
/// element and in order.
pub fn verify_consistency<P>(
    master: &[TaskOccurrence],
    scoped: &[TaskOccurrence],
    partition: P,
    key: &PeriodKey,
) -> Result<(), ReplicationError>
where
    P: Fn(NaiveDate) -> PeriodKey,
{
    let mut filtered = master.iter().filter(|o| &partition(o.date) == key);
    for (position, expected) in scoped.iter().enumerate() {
        match filtered.next() {
            Some(found) if found == expected => {}
            _ => {
                return Err(ReplicationError::Diverged {
                    view: key.label().to_string(),
                    position,
                })
            }
        }
    }
    if filtered.next().is_some() {
        return Err(ReplicationError::Diverged {
            view: key.label().to_string(),
            position: scoped.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{expand, expand_year};
    use crate::rules::Preset;
    use crate::workbook::MemorySink;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Accepts writes until a given number of appends to one view, then
    /// rejects. Optionally refuses to retract.
    struct FlakySink {
        inner: MemorySink,
        failing_view: String,
        accept: usize,
        refuse_retract: bool,
    }

    impl FlakySink {
        fn new(failing_view: &str, accept: usize) -> Self {
            Self {
                inner: MemorySink::new(),
                failing_view: failing_view.to_string(),
                accept,
                refuse_retract: false,
            }
        }
    }

    impl Sink for FlakySink {
        fn create_view(&mut self, name: &str) -> ViewHandle {
            self.inner.create_view(name)
        }

        fn append_occurrence(&mut self, view: &ViewHandle, occurrence: &TaskOccurrence) -> Result<(), SinkRejection> {
            if view.name() == self.failing_view {
                if self.accept == 0 {
                    return Err(SinkRejection::new("sheet is full"));
                }
                self.accept -= 1;
            }
            self.inner.append_occurrence(view, occurrence)
        }

        fn retract_last(&mut self, view: &ViewHandle) -> Result<(), SinkRejection> {
            if self.refuse_retract {
                return Err(SinkRejection::new("read-only"));
            }
            self.inner.retract_last(view)
        }
    }

    mod partition_tests {
        use super::*;

        #[test]
        fn test_by_month_labels() {
            assert_eq!(by_month(date(2025, 1, 31)).label(), "January");
            assert_eq!(by_month(date(2025, 12, 1)).label(), "December");
        }

        #[test]
        fn test_by_iso_week_crosses_year() {
            assert_eq!(by_iso_week(date(2024, 12, 30)).label(), "2025-W01");
            assert_eq!(by_iso_week(date(2025, 1, 6)).label(), "2025-W02");
        }
    }

    mod replicate_tests {
        use super::*;

        #[test]
        fn test_year_creates_master_and_twelve_months() {
            let model = Preset::TaskManager.rule_model().unwrap();
            let occurrences = expand_year(&model, 2025).unwrap();
            let mut sink = MemorySink::new();

            let report = Replicator::default().replicate(&occurrences, by_month, &mut sink).unwrap();

            assert_eq!(report.master_view, "Yearly");
            assert_eq!(report.period_views.len(), 12);
            assert_eq!(report.period_views[0], "January");
            assert_eq!(report.period_views[11], "December");
            assert_eq!(report.replicated, occurrences.len());
            assert!(report.is_complete());
            assert_eq!(sink.view("Yearly").unwrap(), occurrences.as_slice());
            assert_eq!(sink.view_names()[0], "Yearly");

            let total: usize = report.period_views.iter().map(|v| sink.view(v).unwrap().len()).sum();
            assert_eq!(total, occurrences.len());
        }

        #[test]
        fn test_views_are_consistent_with_master() {
            let model = Preset::GeneralRoutine.rule_model().unwrap();
            let occurrences = expand(&model, date(2025, 1, 20), date(2025, 3, 10));
            let mut sink = MemorySink::new();
            let report = Replicator::default().replicate(&occurrences, by_month, &mut sink).unwrap();

            let master = sink.view("Yearly").unwrap();
            for view in &report.period_views {
                let key = PeriodKey::new(view.clone());
                verify_consistency(master, sink.view(view).unwrap(), by_month, &key).unwrap();
            }
        }

        #[test]
        fn test_empty_sequence_creates_only_master() {
            let mut sink = MemorySink::new();
            let report = Replicator::default().replicate(&[], by_month, &mut sink).unwrap();
            assert!(report.period_views.is_empty());
            assert_eq!(report.replicated, 0);
            assert_eq!(sink.view("Yearly").unwrap().len(), 0);
        }

        #[test]
        fn test_master_name_conflict_detected_before_writing() {
            let model = Preset::TaskManager.rule_model().unwrap();
            let occurrences = expand(&model, date(2025, 1, 1), date(2025, 1, 3));
            let mut sink = MemorySink::new();
            let result = Replicator::new("January").replicate(&occurrences, by_month, &mut sink);
            assert_eq!(result.unwrap_err(), ReplicationError::ViewNameConflict("January".to_string()));
            assert!(sink.view_names().is_empty());
        }
    }

    mod failure_tests {
        use super::*;

        fn january_occurrences() -> Vec<TaskOccurrence> {
            let model = Preset::TaskManager.rule_model().unwrap();
            expand(&model, date(2025, 1, 1), date(2025, 1, 5))
        }

        #[test]
        fn test_abort_retracts_master_write_and_reports() {
            let occurrences = january_occurrences();
            let mut sink = FlakySink::new("January", 4);

            let error = Replicator::default()
                .replicate(&occurrences, by_month, &mut sink)
                .unwrap_err();

            match error {
                ReplicationError::Aborted { committed, error } => {
                    assert_eq!(committed, 4);
                    assert_eq!(error.view, "January");
                    assert_eq!(error.index, 4);
                    assert_eq!(error.date, occurrences[4].date);
                    assert_eq!(error.reason, "sheet is full");
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(sink.inner.view("Yearly").unwrap(), &occurrences[..4]);
            assert_eq!(sink.inner.view("January").unwrap(), &occurrences[..4]);
        }

        #[test]
        fn test_master_rejection_writes_nothing_for_that_occurrence() {
            let occurrences = january_occurrences();
            let mut sink = FlakySink::new("Yearly", 2);

            let error = Replicator::default()
                .replicate(&occurrences, by_month, &mut sink)
                .unwrap_err();

            assert!(matches!(error, ReplicationError::Aborted { committed: 2, .. }));
            assert_eq!(sink.inner.view("January").unwrap(), &occurrences[..2]);
        }

        #[test]
        fn test_continue_policy_reports_every_failure() {
            let occurrences = january_occurrences();
            let mut sink = FlakySink::new("January", 3);

            let report = Replicator::default()
                .with_policy(FailurePolicy::Continue)
                .replicate(&occurrences, by_month, &mut sink)
                .unwrap();

            assert_eq!(report.replicated, 3);
            assert_eq!(report.failures.len(), occurrences.len() - 3);
            assert!(!report.is_complete());
            let indices: Vec<_> = report.failures.iter().map(|f| f.index).collect();
            assert_eq!(indices, (3..occurrences.len()).collect::<Vec<_>>());
            assert_eq!(sink.inner.view("Yearly").unwrap(), sink.inner.view("January").unwrap());
        }

        #[test]
        fn test_failed_retraction_is_surfaced() {
            let occurrences = january_occurrences();
            let mut sink = FlakySink::new("January", 0);
            sink.refuse_retract = true;

            let error = Replicator::default()
                .replicate(&occurrences, by_month, &mut sink)
                .unwrap_err();
            assert!(matches!(error, ReplicationError::Inconsistent { ref view, .. } if view == "Yearly"));
        }
    }

    mod verify_tests {
        use super::*;

        #[test]
        fn test_divergence_detected() {
            let model = Preset::TaskManager.rule_model().unwrap();
            let master = expand(&model, date(2025, 1, 30), date(2025, 2, 2));
            let key = PeriodKey::new("February");
            let mut scoped: Vec<_> = master.iter().filter(|o| o.date.month() == 2).cloned().collect();
            assert!(verify_consistency(&master, &scoped, by_month, &key).is_ok());

            scoped.swap(0, 1);
            assert_eq!(
                verify_consistency(&master, &scoped, by_month, &key).unwrap_err(),
                ReplicationError::Diverged { view: "February".to_string(), position: 0 }
            );

            scoped.swap(0, 1);
            scoped.pop();
            let position = scoped.len();
            assert_eq!(
                verify_consistency(&master, &scoped, by_month, &key).unwrap_err(),
                ReplicationError::Diverged { view: "February".to_string(), position }
            );
        }
    }
}
