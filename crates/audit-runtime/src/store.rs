//! Persistence of daily snapshots, settings, run and export records.
//!
//! A snapshot is the unit of replacement: committing a date swaps in its
//! summary, site/BDR/bucket records and anomalies together, so a reader
//! never observes a mix of two runs.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use audit_core::error::{AuditError, Result};
use audit_core::models::DailySnapshot;
use audit_core::settings::AuditSettings;
use audit_core::time_utils::{format_report_date, parse_report_date};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::export::ReportExport;
use crate::run::PipelineRun;

// ── RunLock ───────────────────────────────────────────────────────────────────

/// Exclusive right to run the pipeline against a store; released on drop.
pub struct RunLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RunLock {
    fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("held", &self.release.is_some())
            .finish()
    }
}

// ── MetricsStore ──────────────────────────────────────────────────────────────

/// Storage contract used by the pipeline and the CLI readers.
pub trait MetricsStore: Send + Sync {
    /// Settings for a run; missing keys take their defaults.
    fn load_settings(&self) -> Result<AuditSettings>;

    fn save_settings(&self, settings: &AuditSettings) -> Result<()>;

    fn load_snapshot(&self, report_date: NaiveDate) -> Result<Option<DailySnapshot>>;

    /// Stored report dates, ascending.
    fn available_dates(&self) -> Result<Vec<NaiveDate>>;

    /// Replace everything stored for the snapshot's date in one step.
    fn commit_snapshot(&self, snapshot: &DailySnapshot) -> Result<()>;

    fn record_run(&self, run: &PipelineRun) -> Result<()>;

    fn last_run(&self) -> Result<Option<PipelineRun>>;

    fn record_export(&self, export: &ReportExport) -> Result<()>;

    /// Every recorded export, oldest first.
    fn exports(&self) -> Result<Vec<ReportExport>>;

    /// Take the single-run lock, or fail with [`AuditError::AlreadyRunning`].
    fn acquire_run_lock(&self) -> Result<RunLock>;

    /// Closest stored snapshot strictly before `report_date`.
    fn previous_snapshot(&self, report_date: NaiveDate) -> Result<Option<DailySnapshot>> {
        match self
            .available_dates()?
            .into_iter()
            .filter(|d| *d < report_date)
            .max()
        {
            Some(prev) => self.load_snapshot(prev),
            None => Ok(None),
        }
    }

    /// Most recent stored snapshot.
    fn latest_snapshot(&self) -> Result<Option<DailySnapshot>> {
        match self.available_dates()?.pop() {
            Some(latest) => self.load_snapshot(latest),
            None => Ok(None),
        }
    }
}

// ── JsonStore ─────────────────────────────────────────────────────────────────

/// Directory-backed store.
///
/// ```text
/// <root>/settings.json            key → value
/// <root>/snapshots/YYYY-MM-DD.json one snapshot per report date
/// <root>/runs.jsonl               one run record per line
/// <root>/exports.jsonl            one export record per line
/// <root>/pipeline.lock            present while a run is active
/// ```
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("snapshots"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("pipeline.lock")
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    fn snapshot_path(&self, report_date: NaiveDate) -> PathBuf {
        self.snapshots_dir()
            .join(format!("{}.json", format_report_date(report_date)))
    }

    fn runs_path(&self) -> PathBuf {
        self.root.join("runs.jsonl")
    }

    fn exports_path(&self) -> PathBuf {
        self.root.join("exports.jsonl")
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Records of a JSON-lines file; unreadable lines are skipped.
fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => debug!("Skipping unreadable record in {}: {}", path.display(), e),
        }
    }
    Ok(records)
}

impl MetricsStore for JsonStore {
    fn load_settings(&self) -> Result<AuditSettings> {
        AuditSettings::load_from(&self.settings_path())
    }

    fn save_settings(&self, settings: &AuditSettings) -> Result<()> {
        settings.save_to(&self.settings_path())
    }

    fn load_snapshot(&self, report_date: NaiveDate) -> Result<Option<DailySnapshot>> {
        let path = self.snapshot_path(report_date);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(AuditError::FileRead { path, source }),
        };
        let snapshot: DailySnapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        let dir = self.snapshots_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut dates = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(date) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| parse_report_date(s).ok())
                {
                    dates.push(date);
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    fn commit_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        let path = self.snapshot_path(snapshot.report_date);
        std::fs::create_dir_all(self.snapshots_dir())?;
        let json = serde_json::to_string_pretty(snapshot)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            AuditError::Persistence(format!("failed to replace {}: {e}", path.display()))
        })?;

        debug!(
            date = %snapshot.report_date,
            path = %path.display(),
            anomalies = snapshot.anomalies.len(),
            "Committed snapshot"
        );
        Ok(())
    }

    fn record_run(&self, run: &PipelineRun) -> Result<()> {
        append_line(&self.runs_path(), &serde_json::to_string(run)?)
    }

    fn last_run(&self) -> Result<Option<PipelineRun>> {
        Ok(read_lines::<PipelineRun>(&self.runs_path())?.pop())
    }

    fn record_export(&self, export: &ReportExport) -> Result<()> {
        append_line(&self.exports_path(), &serde_json::to_string(export)?)
    }

    fn exports(&self) -> Result<Vec<ReportExport>> {
        read_lines(&self.exports_path())
    }

    fn acquire_run_lock(&self) -> Result<RunLock> {
        let path = self.lock_path();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(AuditError::AlreadyRunning(path));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(
            file,
            "{} {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;

        Ok(RunLock::new(move || {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove lock file {}: {}", path.display(), e);
            }
        }))
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryState {
    settings: Option<AuditSettings>,
    snapshots: BTreeMap<NaiveDate, DailySnapshot>,
    runs: Vec<PipelineRun>,
    exports: Vec<ReportExport>,
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    locked: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: AuditSettings) -> Self {
        let store = Self::default();
        store.state().settings = Some(settings);
        store
    }

    /// Every recorded run, oldest first.
    pub fn runs(&self) -> Vec<PipelineRun> {
        self.state().runs.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MetricsStore for MemoryStore {
    fn load_settings(&self) -> Result<AuditSettings> {
        Ok(self.state().settings.clone().unwrap_or_default())
    }

    fn save_settings(&self, settings: &AuditSettings) -> Result<()> {
        self.state().settings = Some(settings.clone());
        Ok(())
    }

    fn load_snapshot(&self, report_date: NaiveDate) -> Result<Option<DailySnapshot>> {
        Ok(self.state().snapshots.get(&report_date).cloned())
    }

    fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.state().snapshots.keys().copied().collect())
    }

    fn commit_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        self.state()
            .snapshots
            .insert(snapshot.report_date, snapshot.clone());
        Ok(())
    }

    fn record_run(&self, run: &PipelineRun) -> Result<()> {
        self.state().runs.push(run.clone());
        Ok(())
    }

    fn last_run(&self) -> Result<Option<PipelineRun>> {
        Ok(self.state().runs.last().cloned())
    }

    fn record_export(&self, export: &ReportExport) -> Result<()> {
        self.state().exports.push(export.clone());
        Ok(())
    }

    fn exports(&self) -> Result<Vec<ReportExport>> {
        Ok(self.state().exports.clone())
    }

    fn acquire_run_lock(&self) -> Result<RunLock> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AuditError::AlreadyRunning(PathBuf::from("<memory>")));
        }
        let locked = Arc::clone(&self.locked);
        Ok(RunLock::new(move || locked.store(false, Ordering::Release)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
