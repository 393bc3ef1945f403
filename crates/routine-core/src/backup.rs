//! Daily backup of the persisted workbook.
//!
//! The scheduler runs as one tokio task with explicit states:
//! `Idle -> Armed(next_fire) -> Firing -> Armed(next day) ... -> Idle`.
//! Snapshots run one at a time on that task, so firings never overlap. A
//! failed snapshot is logged and reported, and the scheduler re-arms for the
//! next day.
//!
//! While armed, the task sleeps in steps of at most [`MAX_WAIT_STEP`] and asks
//! the [`Clock`] again on every wake, so DST changes and clock steps move the
//! firing with the wall clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BackupError, CoreError};
use crate::timezone::{local_time, parse_timezone, resolve_local};

/// Timestamp suffix of backup file names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Directory created next to the artifact when none is configured.
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Longest single sleep of an armed scheduler before it reads the clock again.
pub const MAX_WAIT_STEP: std::time::Duration = std::time::Duration::from_secs(60);

/// The next time a daily job scheduled at `at` fires, seen from `now`.
///
/// Today at `at` if that is still ahead of `now`, otherwise tomorrow at `at`.
pub fn next_fire_time(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if now < today {
        today
    } else {
        today + Duration::days(1)
    }
}

// ============================================================================
// Clocks
// ============================================================================

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Real time left until the wall clock reads `target`; zero once it has.
    fn until(&self, target: NaiveDateTime) -> std::time::Duration {
        (target - self.now()).to_std().unwrap_or_default()
    }
}

/// Wall-clock time in an IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn from_name(timezone: &str) -> Result<Self, CoreError> {
        parse_timezone(timezone).map(Self::new)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        local_time(self.timezone, Utc::now())
    }

    fn until(&self, target: NaiveDateTime) -> std::time::Duration {
        wall_clock_wait(self.timezone, target, Utc::now())
    }
}

/// Time from `now` until the wall clock in `tz` reads `target`, counting the
/// hour a DST change adds or removes in between.
pub fn wall_clock_wait(tz: Tz, target: NaiveDateTime, now: DateTime<Utc>) -> std::time::Duration {
    let remaining = match resolve_local(tz, target) {
        Some(instant) => instant.with_timezone(&Utc) - now,
        None => target - local_time(tz, now),
    };
    remaining.to_std().unwrap_or_default()
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Copies the persisted artifact somewhere safe.
#[async_trait]
pub trait SnapshotOperation: Send + Sync {
    /// Takes a snapshot stamped with `at` and returns where it was written.
    async fn snapshot(&self, at: NaiveDateTime) -> Result<PathBuf, BackupError>;
}

/// Copies one file into a backup directory as
/// `<stem>_backup_<YYYYMMDD_HHMMSS>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    source: PathBuf,
    backup_dir: PathBuf,
}

impl FileSnapshot {
    /// Backups go to `backups/` next to `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let backup_dir = source
            .parent()
            .map(|parent| parent.join(DEFAULT_BACKUP_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        Self { source, backup_dir }
    }

    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = backup_dir.into();
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn backup_path(&self, at: NaiveDateTime) -> Result<PathBuf, BackupError> {
        let stem = self
            .source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| BackupError::InvalidSource(self.source.clone()))?;
        let timestamp = at.format(BACKUP_TIMESTAMP_FORMAT);
        let file_name = match self.source.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}_backup_{}.{}", stem, timestamp, ext),
            None => format!("{}_backup_{}", stem, timestamp),
        };
        Ok(self.backup_dir.join(file_name))
    }
}

#[async_trait]
impl SnapshotOperation for FileSnapshot {
    async fn snapshot(&self, at: NaiveDateTime) -> Result<PathBuf, BackupError> {
        if !tokio::fs::try_exists(&self.source).await.unwrap_or(false) {
            return Err(BackupError::SourceMissing(self.source.clone()));
        }
        let target = self.backup_path(at)?;

        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: self.backup_dir.clone(),
                source,
            })?;
        tokio::fs::copy(&self.source, &target)
            .await
            .map_err(|source| BackupError::Copy {
                from: self.source.clone(),
                to: target.clone(),
                source,
            })?;

        Ok(target)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed { next_fire: NaiveDateTime },
    Firing { started: NaiveDateTime },
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Local wall-clock time of the daily backup.
    pub fire_at: NaiveTime,
    /// Abandon a snapshot that runs longer than this.
    pub snapshot_timeout: Option<std::time::Duration>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            fire_at: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
            snapshot_timeout: None,
        }
    }
}

#[derive(Debug)]
pub enum BackupOutcome {
    Saved(PathBuf),
    Failed(BackupError),
}

/// Result of one firing.
#[derive(Debug)]
pub struct BackupReport {
    pub scheduled_for: NaiveDateTime,
    pub outcome: BackupOutcome,
}

pub struct BackupScheduler {
    config: BackupConfig,
    snapshot: Arc<dyn SnapshotOperation>,
    clock: Arc<dyn Clock>,
    reports: Option<mpsc::UnboundedSender<BackupReport>>,
}

impl BackupScheduler {
    pub fn new(
        config: BackupConfig,
        snapshot: Arc<dyn SnapshotOperation>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            snapshot,
            clock,
            reports: None,
        }
    }

    /// Sends a [`BackupReport`] after every firing.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<BackupReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Arms the scheduler on a background task and returns immediately.
    ///
    /// Dropping the returned handle, and every [`BackupStopper`] taken from
    /// it, stops the scheduler.
    pub fn spawn(self) -> BackupHandle {
        let state = Arc::new(Mutex::new(SchedulerState::Idle));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(Arc::clone(&state), stop_rx));
        BackupHandle {
            state,
            stop_tx: Arc::new(stop_tx),
            task,
        }
    }

    async fn run(self, state: Arc<Mutex<SchedulerState>>, mut stop_rx: watch::Receiver<bool>) {
        let mut last_fire: Option<NaiveDateTime> = None;

        'armed: loop {
            if *stop_rx.borrow() {
                break;
            }

            let now = self.clock.now();
            let mut next_fire = next_fire_time(now, self.config.fire_at);
            if let Some(last) = last_fire {
                if next_fire <= last {
                    next_fire = last + Duration::days(1);
                }
            }
            set_state(&state, SchedulerState::Armed { next_fire });
            info!(next_fire = %next_fire, "backup armed");

            loop {
                let wait = self.clock.until(next_fire);
                if wait.is_zero() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(wait.min(MAX_WAIT_STEP)) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            debug!("backup scheduler stopped while armed");
                            break 'armed;
                        }
                    }
                }
            }

            set_state(&state, SchedulerState::Firing { started: self.clock.now() });
            let outcome = self.fire(next_fire).await;
            last_fire = Some(next_fire);

            if let Some(reports) = &self.reports {
                let report = BackupReport {
                    scheduled_for: next_fire,
                    outcome,
                };
                if reports.send(report).is_err() {
                    debug!("backup report channel closed");
                }
            }
        }

        set_state(&state, SchedulerState::Idle);
    }

    async fn fire(&self, scheduled_for: NaiveDateTime) -> BackupOutcome {
        let stamp = self.clock.now();
        let result = match self.config.snapshot_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.snapshot.snapshot(stamp)).await {
                Ok(result) => result,
                Err(_) => Err(BackupError::TimedOut(limit)),
            },
            None => self.snapshot.snapshot(stamp).await,
        };

        match result {
            Ok(path) => {
                info!(scheduled_for = %scheduled_for, path = %path.display(), "backup saved");
                BackupOutcome::Saved(path)
            }
            Err(error) => {
                warn!(scheduled_for = %scheduled_for, %error, "backup failed, will retry next day");
                BackupOutcome::Failed(error)
            }
        }
    }
}

fn set_state(state: &Mutex<SchedulerState>, value: SchedulerState) {
    match state.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

/// Control handle of a running [`BackupScheduler`].
pub struct BackupHandle {
    state: Arc<Mutex<SchedulerState>>,
    stop_tx: Arc<watch::Sender<bool>>,
    task: JoinHandle<()>,
}

impl BackupHandle {
    pub fn state(&self) -> SchedulerState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Cancels the pending arm without firing. A snapshot already in flight
    /// is allowed to finish.
    pub fn stop(&self) {
        request_stop(&self.stop_tx);
    }

    /// Waits for the scheduler task to end. It only ends once a
    /// [`BackupStopper`] taken from this handle is used.
    pub async fn join(self) {
        if let Err(error) = self.task.await {
            warn!(%error, "backup scheduler task ended abnormally");
        }
    }

    /// A detached stop switch for this scheduler.
    pub fn stopper(&self) -> BackupStopper {
        BackupStopper {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Stops the scheduler and waits for its task to end.
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

/// Stops a scheduler without owning its [`BackupHandle`].
#[derive(Clone)]
pub struct BackupStopper {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl BackupStopper {
    pub fn stop(&self) {
        request_stop(&self.stop_tx);
    }
}

fn request_stop(stop_tx: &watch::Sender<bool>) {
    if stop_tx.send(true).is_err() {
        debug!("backup scheduler already ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn fire_at() -> NaiveTime {
        NaiveTime::from_hms_opt(23, 59, 0).unwrap()
    }

    /// Wall-clock time in `tz` that advances with tokio's (paused) clock.
    struct TokioClock {
        timezone: Tz,
        start: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl TokioClock {
        fn starting_at(timezone: Tz, local: NaiveDateTime) -> Arc<Self> {
            let start = crate::timezone::resolve_local(timezone, local)
                .unwrap()
                .with_timezone(&Utc);
            Arc::new(Self {
                timezone,
                start,
                origin: tokio::time::Instant::now(),
            })
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> NaiveDateTime {
            let elapsed = Duration::from_std(self.origin.elapsed()).unwrap();
            local_time(self.timezone, self.start + elapsed)
        }
    }

    /// Counts calls and optionally fails or sleeps.
    struct CountingSnapshot {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail: bool,
        delay: std::time::Duration,
    }

    impl CountingSnapshot {
        fn new(fail: bool, delay: std::time::Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail,
                delay,
            })
        }
    }

    #[async_trait]
    impl SnapshotOperation for CountingSnapshot {
        async fn snapshot(&self, at: NaiveDateTime) -> Result<PathBuf, BackupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(BackupError::SourceMissing(PathBuf::from("TaskManager2025.json")))
            } else {
                Ok(PathBuf::from(format!("backup_{}", at.format(BACKUP_TIMESTAMP_FORMAT))))
            }
        }
    }

    mod next_fire_tests {
        use super::*;

        #[rstest]
        #[case(at(2025, 3, 10, 8, 0, 0), at(2025, 3, 10, 23, 59, 0))]
        #[case(at(2025, 3, 10, 23, 58, 59), at(2025, 3, 10, 23, 59, 0))]
        #[case(at(2025, 3, 10, 23, 59, 0), at(2025, 3, 11, 23, 59, 0))]
        #[case(at(2025, 3, 10, 23, 59, 30), at(2025, 3, 11, 23, 59, 0))]
        #[case(at(2025, 12, 31, 23, 59, 59), at(2026, 1, 1, 23, 59, 0))]
        fn test_next_fire_time(#[case] now: NaiveDateTime, #[case] expected: NaiveDateTime) {
            assert_eq!(next_fire_time(now, fire_at()), expected);
        }
    }

    mod file_snapshot_tests {
        use super::*;

        #[test]
        fn test_backup_path_naming() {
            let snapshot = FileSnapshot::new("/data/TaskManager2025.json");
            assert_eq!(snapshot.backup_dir(), Path::new("/data/backups"));
            assert_eq!(
                snapshot.backup_path(at(2025, 1, 2, 23, 59, 0)).unwrap(),
                PathBuf::from("/data/backups/TaskManager2025_backup_20250102_235900.json")
            );
        }

        #[test]
        fn test_backup_path_without_extension() {
            let snapshot = FileSnapshot::new("plan").with_backup_dir("archive");
            assert_eq!(
                snapshot.backup_path(at(2025, 1, 2, 3, 4, 5)).unwrap(),
                PathBuf::from("archive/plan_backup_20250102_030405")
            );
        }

        #[tokio::test]
        async fn test_snapshot_copies_and_creates_dir() {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("TaskManager2025.json");
            std::fs::write(&source, b"{\"sheets\":[]}").unwrap();

            let snapshot = FileSnapshot::new(&source);
            let written = snapshot.snapshot(at(2025, 6, 1, 23, 59, 0)).await.unwrap();

            assert_eq!(written, dir.path().join("backups/TaskManager2025_backup_20250601_235900.json"));
            assert_eq!(std::fs::read(&written).unwrap(), b"{\"sheets\":[]}");
        }

        #[tokio::test]
        async fn test_snapshot_missing_source() {
            let dir = tempfile::tempdir().unwrap();
            let snapshot = FileSnapshot::new(dir.path().join("absent.json"));
            let error = snapshot.snapshot(at(2025, 6, 1, 23, 59, 0)).await.unwrap_err();
            assert!(matches!(error, BackupError::SourceMissing(_)));
            assert!(!dir.path().join("backups").exists());
        }
    }

    mod wall_clock_tests {
        use super::*;

        #[rstest]
        // 00:00 CET to 23:59 CEST: the spring-forward night is an hour short.
        #[case(Utc.with_ymd_and_hms(2025, 3, 29, 23, 0, 0).unwrap(), at(2025, 3, 30, 23, 59, 0), 22 * 60 + 59)]
        // 00:00 CEST to 23:59 CET: the fall-back night is an hour long.
        #[case(Utc.with_ymd_and_hms(2025, 10, 25, 22, 0, 0).unwrap(), at(2025, 10, 26, 23, 59, 0), 24 * 60 + 59)]
        #[case(Utc.with_ymd_and_hms(2025, 6, 1, 22, 0, 0).unwrap(), at(2025, 6, 2, 23, 59, 0), 23 * 60 + 59)]
        #[case(Utc.with_ymd_and_hms(2025, 6, 2, 22, 0, 0).unwrap(), at(2025, 6, 2, 23, 59, 0), 0)]
        fn test_wall_clock_wait_in_berlin(
            #[case] now: DateTime<Utc>,
            #[case] target: NaiveDateTime,
            #[case] minutes: u64,
        ) {
            assert_eq!(
                wall_clock_wait(chrono_tz::Europe::Berlin, target, now),
                std::time::Duration::from_secs(minutes * 60)
            );
        }
    }

    mod scheduler_tests {
        use super::*;

        fn scheduler_with_clock(
            snapshot: Arc<CountingSnapshot>,
            clock: Arc<dyn Clock>,
            timeout: Option<std::time::Duration>,
        ) -> (BackupScheduler, mpsc::UnboundedReceiver<BackupReport>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let config = BackupConfig {
                fire_at: fire_at(),
                snapshot_timeout: timeout,
            };
            let scheduler = BackupScheduler::new(config, snapshot, clock).with_reports(tx);
            (scheduler, rx)
        }

        fn scheduler(
            snapshot: Arc<CountingSnapshot>,
            now: NaiveDateTime,
            timeout: Option<std::time::Duration>,
        ) -> (BackupScheduler, mpsc::UnboundedReceiver<BackupReport>) {
            scheduler_with_clock(snapshot, TokioClock::starting_at(Tz::UTC, now), timeout)
        }

        fn saved_stamp(report: &BackupReport) -> String {
            match &report.outcome {
                BackupOutcome::Saved(path) => path.display().to_string(),
                BackupOutcome::Failed(error) => panic!("backup failed: {}", error),
            }
        }

        async fn settle() {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_arms_for_today_and_stops_without_firing() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::ZERO);
            let (scheduler, _rx) = scheduler(Arc::clone(&snapshot), at(2025, 3, 10, 12, 0, 0), None);

            let handle = scheduler.spawn();
            settle().await;
            assert_eq!(
                handle.state(),
                SchedulerState::Armed { next_fire: at(2025, 3, 10, 23, 59, 0) }
            );

            handle.stop();
            settle().await;
            assert_eq!(handle.state(), SchedulerState::Idle);
            handle.shutdown().await;
            assert_eq!(snapshot.calls.load(Ordering::SeqCst), 0);
        }

        #[rstest]
        #[case::spring_forward(at(2025, 3, 30, 0, 0, 0), at(2025, 3, 30, 23, 59, 0))]
        #[case::fall_back(at(2025, 10, 26, 0, 0, 0), at(2025, 10, 26, 23, 59, 0))]
        #[tokio::test(start_paused = true)]
        async fn test_fires_at_wall_clock_time_across_dst(
            #[case] start: NaiveDateTime,
            #[case] expected: NaiveDateTime,
        ) {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::ZERO);
            let clock = TokioClock::starting_at(chrono_tz::Europe::Berlin, start);
            let (scheduler, mut rx) = scheduler_with_clock(Arc::clone(&snapshot), clock, None);
            let handle = scheduler.spawn();

            let report = rx.recv().await.unwrap();
            assert_eq!(report.scheduled_for, expected);
            assert_eq!(
                saved_stamp(&report),
                format!("backup_{}", expected.format(BACKUP_TIMESTAMP_FORMAT))
            );

            handle.shutdown().await;
        }

        #[tokio::test(start_paused = true)]
        async fn test_clock_step_is_noticed_while_armed() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::ZERO);
            let clock = Arc::new(FixedClock::new(at(2025, 3, 10, 8, 0, 0)));
            let (scheduler, mut rx) = scheduler_with_clock(Arc::clone(&snapshot), clock.clone(), None);
            let handle = scheduler.spawn();

            tokio::time::sleep(MAX_WAIT_STEP * 5).await;
            assert_eq!(snapshot.calls.load(Ordering::SeqCst), 0);

            // The wall clock jumps forward; the next wake sees it.
            clock.set(at(2025, 3, 10, 23, 59, 0));
            let report = rx.recv().await.unwrap();
            assert_eq!(report.scheduled_for, at(2025, 3, 10, 23, 59, 0));
            assert_eq!(saved_stamp(&report), "backup_20250310_235900");

            handle.shutdown().await;
        }

        #[tokio::test(start_paused = true)]
        async fn test_fires_then_rearms_for_next_day() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::ZERO);
            let (scheduler, mut rx) = scheduler(Arc::clone(&snapshot), at(2025, 3, 10, 23, 0, 0), None);
            let handle = scheduler.spawn();

            let first = rx.recv().await.unwrap();
            assert_eq!(first.scheduled_for, at(2025, 3, 10, 23, 59, 0));
            assert!(matches!(first.outcome, BackupOutcome::Saved(_)));

            let second = rx.recv().await.unwrap();
            assert_eq!(second.scheduled_for, at(2025, 3, 11, 23, 59, 0));

            handle.shutdown().await;
            assert!(snapshot.calls.load(Ordering::SeqCst) >= 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_failed_snapshot_keeps_scheduler_armed() {
            let snapshot = CountingSnapshot::new(true, std::time::Duration::ZERO);
            let (scheduler, mut rx) = scheduler(Arc::clone(&snapshot), at(2025, 3, 10, 23, 0, 0), None);
            let handle = scheduler.spawn();

            let first = rx.recv().await.unwrap();
            assert!(matches!(
                first.outcome,
                BackupOutcome::Failed(BackupError::SourceMissing(_))
            ));

            let second = rx.recv().await.unwrap();
            assert_eq!(second.scheduled_for, at(2025, 3, 11, 23, 59, 0));
            assert!(matches!(second.outcome, BackupOutcome::Failed(_)));

            handle.shutdown().await;
        }

        #[tokio::test(start_paused = true)]
        async fn test_slow_snapshots_never_overlap() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::from_secs(30 * 3600));
            let (scheduler, mut rx) = scheduler(Arc::clone(&snapshot), at(2025, 3, 10, 23, 0, 0), None);
            let handle = scheduler.spawn();

            for _ in 0..3 {
                rx.recv().await.unwrap();
            }
            handle.shutdown().await;
            assert_eq!(snapshot.max_in_flight.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stopper_ends_joined_scheduler() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::ZERO);
            let (scheduler, mut rx) = scheduler(Arc::clone(&snapshot), at(2025, 3, 10, 23, 0, 0), None);
            let handle = scheduler.spawn();
            let stopper = handle.stopper();

            tokio::spawn(async move {
                rx.recv().await;
                stopper.stop();
            });
            handle.join().await;
            assert_eq!(snapshot.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stopper_after_shutdown_is_harmless() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::ZERO);
            let (scheduler, _rx) = scheduler(Arc::clone(&snapshot), at(2025, 3, 10, 12, 0, 0), None);
            let handle = scheduler.spawn();
            let stopper = handle.stopper();

            handle.shutdown().await;
            stopper.stop();
            stopper.clone().stop();
            assert_eq!(snapshot.calls.load(Ordering::SeqCst), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_snapshot_timeout_reported() {
            let snapshot = CountingSnapshot::new(false, std::time::Duration::from_secs(600));
            let (scheduler, mut rx) = scheduler(
                Arc::clone(&snapshot),
                at(2025, 3, 10, 23, 0, 0),
                Some(std::time::Duration::from_secs(5)),
            );
            let handle = scheduler.spawn();

            let report = rx.recv().await.unwrap();
            assert!(matches!(report.outcome, BackupOutcome::Failed(BackupError::TimedOut(_))));
            handle.shutdown().await;
        }
    }
}
