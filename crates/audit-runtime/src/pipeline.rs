//! Pipeline runner: resolves the dates a trigger asks for, ingests both
//! sources concurrently, computes metrics and anomalies, and commits each
//! date's snapshot to the store.
//!
//! Only one run may be active per store. A second trigger fails fast with
//! [`AuditError::AlreadyRunning`] and is not recorded.

use std::path::PathBuf;
use std::sync::Arc;

use audit_core::error::{AuditError, Result};
use audit_core::models::{IngestBatch, Severity};
use audit_core::settings::AuditSettings;
use audit_data::anomaly::AnomalyDetector;
use audit_data::metrics::{BucketFilter, MetricsComputer};
use audit_data::reader;
use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::run::{PipelineRun, RunStatus, RunTarget};
use crate::store::MetricsStore;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Where the exports live and which buckets are audited.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub veeam_dir: PathBuf,
    pub wasabi_dir: PathBuf,
    pub bucket_filter: BucketFilter,
}

impl PipelineConfig {
    pub fn new(veeam_dir: impl Into<PathBuf>, wasabi_dir: impl Into<PathBuf>) -> Self {
        Self {
            veeam_dir: veeam_dir.into(),
            wasabi_dir: wasabi_dir.into(),
            bucket_filter: BucketFilter::default(),
        }
    }

    pub fn with_bucket_filter(mut self, bucket_filter: BucketFilter) -> Self {
        self.bucket_filter = bucket_filter;
        self
    }
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// What happened to one report date.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDate {
    pub report_date: NaiveDate,
    pub anomaly_count: usize,
    pub highest_severity: Option<Severity>,
    /// Input rows skipped plus records the detector could not evaluate.
    pub issue_count: usize,
}

/// Result of one trigger; `run` is what was recorded in the store.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: PipelineRun,
    pub processed: Vec<ProcessedDate>,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        self.run.status
    }
}

// ── PipelineRunner ────────────────────────────────────────────────────────────

pub struct PipelineRunner {
    store: Arc<dyn MetricsStore>,
    config: PipelineConfig,
}

impl PipelineRunner {
    pub fn new(store: Arc<dyn MetricsStore>, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    /// Execute a trigger.
    ///
    /// Returns `Err` only for the conflict signal or when the run record
    /// itself cannot be written; processing failures come back as
    /// [`RunStatus::Failed`].
    pub async fn run(&self, target: RunTarget) -> Result<RunOutcome> {
        let _lock = self.store.acquire_run_lock()?;
        let started_at = Utc::now();
        info!(target = %target, "Pipeline run started");

        let mut warnings = Vec::new();
        let mut processed = Vec::new();
        let mut failures = Vec::new();

        match self.resolve_dates(target) {
            Ok(dates) => {
                // Settings are read once and shared by every date of the run.
                match self.store.load_settings() {
                    Ok(settings) => {
                        for date in dates {
                            match self.process_date(date, &settings).await {
                                Ok((done, date_warnings)) => {
                                    warnings.extend(date_warnings);
                                    processed.push(done);
                                }
                                Err(e) => {
                                    error!(date = %date, error = %e, "Report date failed");
                                    failures.push(format!("{date}: {e}"));
                                }
                            }
                        }
                    }
                    Err(e) => failures.push(format!("settings: {e}")),
                }
            }
            Err(e) => failures.push(e.to_string()),
        }

        let status = if processed.is_empty() {
            RunStatus::Failed
        } else if failures.is_empty() && warnings.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithWarnings
        };

        let error = match status {
            RunStatus::Failed => Some(if failures.is_empty() {
                "no report dates to process".to_string()
            } else {
                failures.join("; ")
            }),
            _ => {
                warnings.extend(failures);
                None
            }
        };

        let run = PipelineRun {
            started_at,
            completed_at: Utc::now(),
            target: target.to_string(),
            report_dates: processed.iter().map(|p| p.report_date).collect(),
            status,
            warnings,
            error,
        };
        self.store.record_run(&run)?;

        info!(
            status = run.status.as_str(),
            dates = run.report_dates.len(),
            warnings = run.warnings.len(),
            duration_secs = run.duration_secs(),
            "Pipeline run finished"
        );
        Ok(RunOutcome { run, processed })
    }

    fn resolve_dates(&self, target: RunTarget) -> Result<Vec<NaiveDate>> {
        match target {
            RunTarget::Date(date) => Ok(vec![date]),
            RunTarget::Latest => Ok(vec![reader::latest_report_date(&self.config.veeam_dir)?]),
            RunTarget::Backfill { from } => {
                let dates: Vec<NaiveDate> = reader::list_report_dates(&self.config.veeam_dir)?
                    .into_iter()
                    .filter(|d| from.map_or(true, |f| *d >= f))
                    .collect();
                if dates.is_empty() {
                    return Err(AuditError::NoDataFiles(self.config.veeam_dir.clone()));
                }
                info!(count = dates.len(), "Backfilling report dates");
                Ok(dates)
            }
        }
    }

    /// Ingest, compute, detect and commit one date.
    async fn process_date(
        &self,
        date: NaiveDate,
        settings: &AuditSettings,
    ) -> Result<(ProcessedDate, Vec<String>)> {
        let batch = self.ingest(date).await?;

        let metrics = MetricsComputer::new(settings)
            .with_bucket_filter(self.config.bucket_filter.clone())
            .compute(date, &batch)?;

        let previous = self.store.previous_snapshot(date)?;
        let detection = AnomalyDetector::new(settings).detect(&metrics.snapshot, previous.as_ref());

        let mut snapshot = metrics.snapshot;
        snapshot.anomalies = detection.anomalies;
        self.store.commit_snapshot(&snapshot)?;

        let mut warnings: Vec<String> = metrics
            .issues
            .iter()
            .map(|i| format!("{date}: {}: {}", i.source, i.detail))
            .collect();
        warnings.extend(
            detection
                .issues
                .iter()
                .map(|i| format!("{date}: {}: {}", i.subject, i.detail)),
        );
        if !warnings.is_empty() {
            warn!(date = %date, count = warnings.len(), "Rows skipped");
        }

        let done = ProcessedDate {
            report_date: date,
            anomaly_count: snapshot.anomalies.len(),
            highest_severity: snapshot.anomalies.iter().map(|a| a.severity).max(),
            issue_count: warnings.len(),
        };
        info!(
            date = %date,
            sites = snapshot.sites.len(),
            anomalies = done.anomaly_count,
            "Report date committed"
        );
        Ok((done, warnings))
    }

    /// Read the Veeam folder and the Wasabi export on blocking tasks; both
    /// must finish before computation starts.
    async fn ingest(&self, date: NaiveDate) -> Result<IngestBatch> {
        let veeam_dir = self.config.veeam_dir.clone();
        let wasabi_dir = self.config.wasabi_dir.clone();

        let veeam = tokio::task::spawn_blocking(move || reader::load_veeam_export(&veeam_dir, date));
        let wasabi =
            tokio::task::spawn_blocking(move || reader::load_wasabi_export(&wasabi_dir, date));

        let (veeam, wasabi) = tokio::try_join!(join_ingest(veeam), join_ingest(wasabi))?;
        Ok(reader::merge_exports(veeam, wasabi))
    }
}

async fn join_ingest<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(AuditError::Other(anyhow::Error::new(e))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
