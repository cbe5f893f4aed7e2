use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Raw ingest rows ───────────────────────────────────────────────────────────

/// Local capacity reported by one BDR appliance, sizes in GB as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BdrCapacityRow {
    /// Server name, taken from the export file name.
    pub bdr_server: String,
    /// Total size of all backups held on the appliance.
    pub backup_size_gb: f64,
    /// Free space left on the backup volume.
    pub disk_free_gb: f64,
}

/// One Veeam job line from a BDR audit export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VeeamJobRow {
    /// Server the job runs on.
    pub bdr_server: String,
    /// Job display name.
    #[serde(default)]
    pub job_name: String,
    /// Rolling 24 h success rate of the job, when the export carries it.
    #[serde(default)]
    pub success_rate_24h: Option<f64>,
    /// Textual result of the last run (`Success`, `Warning`, `Failed`).
    #[serde(default)]
    pub last_result: Option<String>,
    /// Backup chain mode, e.g. `Incremental` or `Reverse Incremental`.
    #[serde(default)]
    pub backup_mode: Option<String>,
    /// Free-form schedule / retention description.
    #[serde(default)]
    pub schedule: Option<String>,
}

/// Billable storage of one Wasabi bucket, sizes in TB as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketUsageRow {
    pub bucket_name: String,
    pub active_tb: f64,
    pub deleted_tb: f64,
}

/// A raw row that was skipped during ingestion or computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputIssue {
    /// File or entity the row came from.
    pub source: String,
    /// Why the row was rejected.
    pub detail: String,
}

impl InputIssue {
    pub fn new(source: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            detail: detail.into(),
        }
    }
}

/// All raw rows gathered for one report date.
#[derive(Debug, Clone, Default)]
pub struct IngestBatch {
    pub bdr_rows: Vec<BdrCapacityRow>,
    pub job_rows: Vec<VeeamJobRow>,
    pub bucket_rows: Vec<BucketUsageRow>,
    /// Rows the reader could not decode.
    pub issues: Vec<InputIssue>,
}

impl IngestBatch {
    /// `true` when no source produced a single row.
    pub fn is_empty(&self) -> bool {
        self.bdr_rows.is_empty() && self.job_rows.is_empty() && self.bucket_rows.is_empty()
    }
}

// ── Job classification ────────────────────────────────────────────────────────

/// Outcome bucket a job falls into for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Warning,
    Failed,
}

/// Backup chain mode of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    Increment,
    ReverseIncrement,
    Other,
}

/// Retention tier derived from the job schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionTier {
    Gold,
    Silver,
    Bronze,
}

impl VeeamJobRow {
    /// Classify the job outcome.
    ///
    /// The 24 h success rate wins when present (`< 50` failed, `< 80`
    /// warning); otherwise the last-result text is used; a job with neither
    /// counts as a success.
    pub fn outcome(&self) -> JobOutcome {
        if let Some(rate) = self.success_rate_24h.filter(|r| r.is_finite()) {
            return if rate < 50.0 {
                JobOutcome::Failed
            } else if rate < 80.0 {
                JobOutcome::Warning
            } else {
                JobOutcome::Success
            };
        }

        match self.last_result.as_deref().map(str::trim) {
            Some(r) if r.eq_ignore_ascii_case("failed") => JobOutcome::Failed,
            Some(r) if r.eq_ignore_ascii_case("warning") => JobOutcome::Warning,
            _ => JobOutcome::Success,
        }
    }

    /// Classify the backup mode. `reverse` takes precedence because the
    /// reverse-incremental label also contains `increment`.
    pub fn mode(&self) -> BackupMode {
        let mode = self.backup_mode.as_deref().unwrap_or("").to_lowercase();
        if mode.contains("reverse") {
            BackupMode::ReverseIncrement
        } else if mode.contains("increment") {
            BackupMode::Increment
        } else {
            BackupMode::Other
        }
    }

    /// Retention tier from the schedule text, `None` when it carries no tier hint.
    pub fn tier(&self) -> Option<RetentionTier> {
        let schedule = self.schedule.as_deref().unwrap_or("").to_lowercase();
        if schedule.contains("gold") || schedule.contains("daily") || schedule.contains("every day")
        {
            Some(RetentionTier::Gold)
        } else if schedule.contains("silver") || schedule.contains("weekly") {
            Some(RetentionTier::Silver)
        } else if schedule.contains("bronze") || schedule.contains("monthly") {
            Some(RetentionTier::Bronze)
        } else {
            None
        }
    }
}

// ── Derived records ───────────────────────────────────────────────────────────

/// Per-BDR capacity metrics for one report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BdrRecord {
    pub report_date: NaiveDate,
    pub bdr_server: String,
    pub site_code: String,
    pub backup_size_tb: f64,
    pub disk_free_tb: f64,
    pub disk_free_pct: f64,
}

/// Per-bucket storage and cost metrics for one report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub report_date: NaiveDate,
    pub bucket_name: String,
    pub site_code: String,
    pub active_tb: f64,
    pub deleted_tb: f64,
    pub active_cost: f64,
    pub deleted_cost: f64,
    pub total_cost: f64,
}

/// Per-site job tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCounts {
    pub total_jobs: u32,
    pub successful_jobs: u32,
    pub failed_jobs: u32,
    pub warning_jobs: u32,
    pub increment_jobs: u32,
    pub reverse_increment_jobs: u32,
    pub gold_jobs: u32,
    pub silver_jobs: u32,
    pub bronze_jobs: u32,
}

impl JobCounts {
    /// Accumulate another set of counts into this one.
    pub fn add(&mut self, other: &JobCounts) {
        self.total_jobs += other.total_jobs;
        self.successful_jobs += other.successful_jobs;
        self.failed_jobs += other.failed_jobs;
        self.warning_jobs += other.warning_jobs;
        self.increment_jobs += other.increment_jobs;
        self.reverse_increment_jobs += other.reverse_increment_jobs;
        self.gold_jobs += other.gold_jobs;
        self.silver_jobs += other.silver_jobs;
        self.bronze_jobs += other.bronze_jobs;
    }
}

/// Joined Veeam / Wasabi metrics for one site on one report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub report_date: NaiveDate,
    pub site_code: String,
    pub veeam_tb: f64,
    pub wasabi_active_tb: f64,
    pub wasabi_deleted_tb: f64,
    pub discrepancy_pct: f64,
    pub active_cost: f64,
    pub deleted_cost: f64,
    pub total_cost: f64,
    #[serde(flatten)]
    pub jobs: JobCounts,
    /// `None` when the site ran no jobs.
    pub success_rate_pct: Option<f64>,
    /// Number of BDR servers mapped to the site.
    pub bdr_count: u32,
    /// Number of buckets mapped to the site.
    pub bucket_count: u32,
}

/// Aggregate totals across all sites for one report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub report_date: NaiveDate,
    pub veeam_tb: f64,
    pub wasabi_active_tb: f64,
    pub wasabi_deleted_tb: f64,
    pub discrepancy_pct: f64,
    pub active_cost: f64,
    pub deleted_cost: f64,
    pub total_cost: f64,
    pub total_jobs: u32,
    pub successful_jobs: u32,
    pub failed_jobs: u32,
    pub warning_jobs: u32,
    pub success_rate_pct: Option<f64>,
    pub low_disk_count: u32,
    pub high_discrepancy_count: u32,
    pub high_deleted_count: u32,
    pub site_count: u32,
    pub bdr_count: u32,
    pub bucket_count: u32,
}

// ── Anomalies ─────────────────────────────────────────────────────────────────

/// Anomaly severity; ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Rule that produced an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    LowDisk,
    HighDiscrepancy,
    HighDeletedRatio,
    SiteFailedJobs,
    FailedJobSpike,
    MetricSwing,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::LowDisk => "low_disk",
            AnomalyType::HighDiscrepancy => "high_discrepancy",
            AnomalyType::HighDeletedRatio => "high_deleted_ratio",
            AnomalyType::SiteFailedJobs => "site_failed_jobs",
            AnomalyType::FailedJobSpike => "failed_job_spike",
            AnomalyType::MetricSwing => "metric_swing",
        }
    }
}

/// Numeric metrics tracked day over day by the swing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    VeeamTb,
    WasabiActiveTb,
    WasabiDeletedTb,
    TotalCost,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::VeeamTb,
        MetricKind::WasabiActiveTb,
        MetricKind::WasabiDeletedTb,
        MetricKind::TotalCost,
    ];

    /// Human-readable label used in anomaly descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::VeeamTb => "Veeam backup size",
            MetricKind::WasabiActiveTb => "Wasabi active storage",
            MetricKind::WasabiDeletedTb => "Wasabi deleted storage",
            MetricKind::TotalCost => "Total cost",
        }
    }

    pub fn of_summary(&self, summary: &DailySummary) -> f64 {
        match self {
            MetricKind::VeeamTb => summary.veeam_tb,
            MetricKind::WasabiActiveTb => summary.wasabi_active_tb,
            MetricKind::WasabiDeletedTb => summary.wasabi_deleted_tb,
            MetricKind::TotalCost => summary.total_cost,
        }
    }

    pub fn of_site(&self, site: &SiteRecord) -> f64 {
        match self {
            MetricKind::VeeamTb => site.veeam_tb,
            MetricKind::WasabiActiveTb => site.wasabi_active_tb,
            MetricKind::WasabiDeletedTb => site.wasabi_deleted_tb,
            MetricKind::TotalCost => site.total_cost,
        }
    }
}

/// Metric an anomaly refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DiskFreePct,
    DiscrepancyPct,
    DeletedRatio,
    FailedJobs,
    VeeamTb,
    WasabiActiveTb,
    WasabiDeletedTb,
    TotalCost,
}

impl From<MetricKind> for Metric {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::VeeamTb => Metric::VeeamTb,
            MetricKind::WasabiActiveTb => Metric::WasabiActiveTb,
            MetricKind::WasabiDeletedTb => Metric::WasabiDeletedTb,
            MetricKind::TotalCost => Metric::TotalCost,
        }
    }
}

/// A flagged condition for one report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub report_date: NaiveDate,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub metric: Metric,
    /// Site, BDR server or bucket the anomaly is about; `None` for aggregate rules.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub previous_value: Option<f64>,
    pub current_value: f64,
    #[serde(default)]
    pub change_pct: Option<f64>,
    pub description: String,
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Every derived row for one report date; the unit the store replaces atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub report_date: NaiveDate,
    pub summary: DailySummary,
    pub sites: Vec<SiteRecord>,
    pub bdrs: Vec<BdrRecord>,
    pub buckets: Vec<BucketRecord>,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
}

impl DailySnapshot {
    pub fn site(&self, site_code: &str) -> Option<&SiteRecord> {
        self.sites.iter().find(|s| s.site_code == site_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(rate: Option<f64>, result: Option<&str>) -> VeeamJobRow {
        VeeamJobRow {
            bdr_server: "AJC-BDR3".to_string(),
            job_name: "Nightly".to_string(),
            success_rate_24h: rate,
            last_result: result.map(str::to_string),
            ..Default::default()
        }
    }

    // ── outcome ──────────────────────────────────────────────────────────────

    #[test]
    fn test_outcome_from_success_rate() {
        assert_eq!(job(Some(10.0), None).outcome(), JobOutcome::Failed);
        assert_eq!(job(Some(50.0), None).outcome(), JobOutcome::Warning);
        assert_eq!(job(Some(79.9), None).outcome(), JobOutcome::Warning);
        assert_eq!(job(Some(80.0), None).outcome(), JobOutcome::Success);
    }

    #[test]
    fn test_outcome_rate_wins_over_last_result() {
        assert_eq!(job(Some(100.0), Some("Failed")).outcome(), JobOutcome::Success);
    }

    #[test]
    fn test_outcome_from_last_result() {
        assert_eq!(job(None, Some("Failed")).outcome(), JobOutcome::Failed);
        assert_eq!(job(None, Some("warning")).outcome(), JobOutcome::Warning);
        assert_eq!(job(None, Some("Success")).outcome(), JobOutcome::Success);
        assert_eq!(job(None, None).outcome(), JobOutcome::Success);
    }

    #[test]
    fn test_outcome_ignores_nan_rate() {
        assert_eq!(job(Some(f64::NAN), Some("Failed")).outcome(), JobOutcome::Failed);
    }

    // ── mode / tier ──────────────────────────────────────────────────────────

    #[test]
    fn test_mode_reverse_wins() {
        let mut row = job(None, None);
        row.backup_mode = Some("Reverse Incremental".to_string());
        assert_eq!(row.mode(), BackupMode::ReverseIncrement);
        row.backup_mode = Some("Forever Forward Incremental".to_string());
        assert_eq!(row.mode(), BackupMode::Increment);
        row.backup_mode = None;
        assert_eq!(row.mode(), BackupMode::Other);
    }

    #[test]
    fn test_tier_from_schedule() {
        let mut row = job(None, None);
        row.schedule = Some("Every day at 22:00".to_string());
        assert_eq!(row.tier(), Some(RetentionTier::Gold));
        row.schedule = Some("Weekly on Saturday".to_string());
        assert_eq!(row.tier(), Some(RetentionTier::Silver));
        row.schedule = Some("Bronze".to_string());
        assert_eq!(row.tier(), Some(RetentionTier::Bronze));
        row.schedule = Some("Manual".to_string());
        assert_eq!(row.tier(), None);
    }

    // ── serde ────────────────────────────────────────────────────────────────

    #[test]
    fn test_anomaly_serializes_wire_names() {
        let anomaly = Anomaly {
            report_date: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
            severity: Severity::Critical,
            anomaly_type: AnomalyType::LowDisk,
            metric: Metric::DiskFreePct,
            subject: Some("AJC-BDR3".to_string()),
            previous_value: None,
            current_value: 4.0,
            change_pct: None,
            description: "AJC-BDR3 has only 4.00% disk free".to_string(),
        };
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["type"], "low_disk");
        assert_eq!(json["metric"], "disk_free_pct");
        assert_eq!(json["report_date"], "2026-01-28");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_job_counts_add() {
        let mut a = JobCounts {
            total_jobs: 2,
            failed_jobs: 1,
            ..Default::default()
        };
        let b = JobCounts {
            total_jobs: 3,
            failed_jobs: 2,
            gold_jobs: 3,
            ..Default::default()
        };
        a.add(&b);
        assert_eq!(a.total_jobs, 5);
        assert_eq!(a.failed_jobs, 3);
        assert_eq!(a.gold_jobs, 3);
    }
}
