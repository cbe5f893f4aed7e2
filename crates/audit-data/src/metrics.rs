//! Metrics computation: joins one day's raw Veeam and Wasabi rows by site
//! code and derives the per-BDR, per-bucket, per-site and daily records.
//!
//! The computation is pure. Records come out sorted by their natural key, so
//! the same batch always serializes to the same bytes.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use audit_core::calculations::{
    discrepancy_pct, disk_free_pct, gb_to_tb, is_high_deleted_ratio, is_high_discrepancy,
    is_low_disk, success_rate_pct,
};
use audit_core::error::{AuditError, Result};
use audit_core::models::{
    BackupMode, BdrRecord, BucketRecord, DailySnapshot, DailySummary, IngestBatch, InputIssue,
    JobCounts, JobOutcome, RetentionTier, SiteRecord, VeeamJobRow,
};
use audit_core::pricing::{CostBreakdown, StoragePricing};
use audit_core::settings::AuditSettings;
use audit_core::site_code::extract_site_code;
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Bucket-name filter used when none is configured.
pub const DEFAULT_BUCKET_FILTER: &str = "veeam";

// ── BucketFilter ──────────────────────────────────────────────────────────────

/// Case-insensitive substring filter on bucket names; empty admits everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFilter {
    needle: String,
}

impl BucketFilter {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.trim().to_lowercase(),
        }
    }

    /// A filter that admits every bucket.
    pub fn all() -> Self {
        Self::new("")
    }

    pub fn matches(&self, bucket_name: &str) -> bool {
        self.needle.is_empty() || bucket_name.to_lowercase().contains(&self.needle)
    }
}

impl Default for BucketFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_FILTER)
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Result of one computation.
#[derive(Debug, Clone)]
pub struct MetricsOutput {
    /// Derived records; `anomalies` is left empty for the detector.
    pub snapshot: DailySnapshot,
    /// Rows skipped during ingestion or computation.
    pub issues: Vec<InputIssue>,
    /// Buckets left out by the bucket filter.
    pub filtered_buckets: usize,
}

// ── Site accumulator ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SiteAccumulator {
    veeam_tb: f64,
    wasabi_active_tb: f64,
    wasabi_deleted_tb: f64,
    costs: CostBreakdown,
    jobs: JobCounts,
    has_tier_info: bool,
    bdr_count: u32,
    bucket_count: u32,
}

impl SiteAccumulator {
    fn add_job(&mut self, job: &VeeamJobRow) {
        self.jobs.total_jobs += 1;
        match job.outcome() {
            JobOutcome::Success => self.jobs.successful_jobs += 1,
            JobOutcome::Warning => self.jobs.warning_jobs += 1,
            JobOutcome::Failed => self.jobs.failed_jobs += 1,
        }
        match job.mode() {
            BackupMode::Increment => self.jobs.increment_jobs += 1,
            BackupMode::ReverseIncrement => self.jobs.reverse_increment_jobs += 1,
            BackupMode::Other => {}
        }
        if let Some(tier) = job.tier() {
            self.has_tier_info = true;
            match tier {
                RetentionTier::Gold => self.jobs.gold_jobs += 1,
                RetentionTier::Silver => self.jobs.silver_jobs += 1,
                RetentionTier::Bronze => self.jobs.bronze_jobs += 1,
            }
        }
    }

    fn into_record(mut self, report_date: NaiveDate, site_code: String) -> SiteRecord {
        // Sites without any schedule hints count every job as gold.
        if !self.has_tier_info {
            self.jobs.gold_jobs = self.jobs.total_jobs;
        }
        SiteRecord {
            report_date,
            site_code,
            veeam_tb: self.veeam_tb,
            wasabi_active_tb: self.wasabi_active_tb,
            wasabi_deleted_tb: self.wasabi_deleted_tb,
            discrepancy_pct: discrepancy_pct(self.veeam_tb, self.wasabi_active_tb),
            active_cost: self.costs.active_cost,
            deleted_cost: self.costs.deleted_cost,
            total_cost: self.costs.total_cost,
            success_rate_pct: success_rate_pct(self.jobs.successful_jobs, self.jobs.total_jobs),
            jobs: self.jobs,
            bdr_count: self.bdr_count,
            bucket_count: self.bucket_count,
        }
    }
}

// ── MetricsComputer ───────────────────────────────────────────────────────────

/// Derives a [`DailySnapshot`] from an [`IngestBatch`].
pub struct MetricsComputer<'a> {
    settings: &'a AuditSettings,
    pricing: StoragePricing,
    bucket_filter: BucketFilter,
}

impl<'a> MetricsComputer<'a> {
    pub fn new(settings: &'a AuditSettings) -> Self {
        Self {
            settings,
            pricing: StoragePricing::from_settings(settings),
            bucket_filter: BucketFilter::default(),
        }
    }

    pub fn with_bucket_filter(mut self, bucket_filter: BucketFilter) -> Self {
        self.bucket_filter = bucket_filter;
        self
    }

    /// Compute every record for `report_date`.
    ///
    /// Invalid rows are skipped and reported. Fails with
    /// [`AuditError::NoUsableData`] when nothing usable remains.
    pub fn compute(&self, report_date: NaiveDate, batch: &IngestBatch) -> Result<MetricsOutput> {
        let mut issues = batch.issues.clone();
        let mut sites: BTreeMap<String, SiteAccumulator> = BTreeMap::new();

        let bdrs = self.bdr_records(report_date, batch, &mut issues);
        for bdr in bdrs.values() {
            let site = sites.entry(bdr.site_code.clone()).or_default();
            site.veeam_tb += bdr.backup_size_tb;
            site.bdr_count += 1;
        }

        let mut job_count = 0usize;
        for job in &batch.job_rows {
            if let Some(detail) = invalid_job(job) {
                issues.push(InputIssue::new(job_source(job), detail));
                continue;
            }
            job_count += 1;
            sites
                .entry(extract_site_code(&job.bdr_server))
                .or_default()
                .add_job(job);
        }

        let (buckets, filtered_buckets) = self.bucket_records(report_date, batch, &mut issues);
        for bucket in buckets.values() {
            let site = sites.entry(bucket.site_code.clone()).or_default();
            site.wasabi_active_tb += bucket.active_tb;
            site.wasabi_deleted_tb += bucket.deleted_tb;
            site.costs.add(&CostBreakdown {
                active_cost: bucket.active_cost,
                deleted_cost: bucket.deleted_cost,
                total_cost: bucket.total_cost,
            });
            site.bucket_count += 1;
        }

        if bdrs.is_empty() && buckets.is_empty() && job_count == 0 {
            warn!(date = %report_date, issues = issues.len(), "No usable rows");
            return Err(AuditError::NoUsableData(report_date));
        }

        let sites: Vec<SiteRecord> = sites
            .into_iter()
            .map(|(code, acc)| acc.into_record(report_date, code))
            .collect();
        let bdrs: Vec<BdrRecord> = bdrs.into_values().collect();
        let buckets: Vec<BucketRecord> = buckets.into_values().collect();
        let summary = self.summarize(report_date, &sites, &bdrs, &buckets);

        debug!(
            date = %report_date,
            sites = sites.len(),
            bdrs = bdrs.len(),
            buckets = buckets.len(),
            filtered_buckets,
            issues = issues.len(),
            "Computed metrics"
        );

        Ok(MetricsOutput {
            snapshot: DailySnapshot {
                report_date,
                summary,
                sites,
                bdrs,
                buckets,
                anomalies: Vec::new(),
            },
            issues,
            filtered_buckets,
        })
    }

    fn bdr_records(
        &self,
        report_date: NaiveDate,
        batch: &IngestBatch,
        issues: &mut Vec<InputIssue>,
    ) -> BTreeMap<String, BdrRecord> {
        let mut bdrs = BTreeMap::new();
        for row in &batch.bdr_rows {
            let server = row.bdr_server.trim();
            if server.is_empty() {
                issues.push(InputIssue::new("veeam", "capacity row without BDR server"));
                continue;
            }
            if !valid_amount(row.backup_size_gb) || !valid_amount(row.disk_free_gb) {
                issues.push(InputIssue::new(
                    server,
                    format!(
                        "invalid capacity (backup {} GB, free {} GB)",
                        row.backup_size_gb, row.disk_free_gb
                    ),
                ));
                continue;
            }

            let backup_size_tb = gb_to_tb(row.backup_size_gb);
            let disk_free_tb = gb_to_tb(row.disk_free_gb);
            match bdrs.entry(server.to_string()) {
                Entry::Occupied(_) => {
                    issues.push(InputIssue::new(server, "duplicate capacity row ignored"));
                }
                Entry::Vacant(slot) => {
                    slot.insert(BdrRecord {
                        report_date,
                        bdr_server: server.to_string(),
                        site_code: extract_site_code(server),
                        backup_size_tb,
                        disk_free_tb,
                        disk_free_pct: disk_free_pct(disk_free_tb, backup_size_tb),
                    });
                }
            }
        }
        bdrs
    }

    fn bucket_records(
        &self,
        report_date: NaiveDate,
        batch: &IngestBatch,
        issues: &mut Vec<InputIssue>,
    ) -> (BTreeMap<String, BucketRecord>, usize) {
        let mut buckets = BTreeMap::new();
        let mut filtered = 0usize;
        for row in &batch.bucket_rows {
            let name = row.bucket_name.trim();
            if name.is_empty() {
                issues.push(InputIssue::new("wasabi", "bucket row without name"));
                continue;
            }
            if !self.bucket_filter.matches(name) {
                filtered += 1;
                continue;
            }
            if !valid_amount(row.active_tb) || !valid_amount(row.deleted_tb) {
                issues.push(InputIssue::new(
                    name,
                    format!(
                        "invalid storage (active {} TB, deleted {} TB)",
                        row.active_tb, row.deleted_tb
                    ),
                ));
                continue;
            }

            match buckets.entry(name.to_string()) {
                Entry::Occupied(_) => {
                    issues.push(InputIssue::new(name, "duplicate bucket row ignored"));
                }
                Entry::Vacant(slot) => {
                    let costs = self.pricing.breakdown(row.active_tb, row.deleted_tb);
                    slot.insert(BucketRecord {
                        report_date,
                        bucket_name: name.to_string(),
                        site_code: extract_site_code(name),
                        active_tb: row.active_tb,
                        deleted_tb: row.deleted_tb,
                        active_cost: costs.active_cost,
                        deleted_cost: costs.deleted_cost,
                        total_cost: costs.total_cost,
                    });
                }
            }
        }
        (buckets, filtered)
    }

    fn summarize(
        &self,
        report_date: NaiveDate,
        sites: &[SiteRecord],
        bdrs: &[BdrRecord],
        buckets: &[BucketRecord],
    ) -> DailySummary {
        let mut veeam_tb = 0.0;
        let mut wasabi_active_tb = 0.0;
        let mut wasabi_deleted_tb = 0.0;
        let mut costs = CostBreakdown::default();
        let mut jobs = JobCounts::default();
        let mut bdr_count = 0;
        let mut bucket_count = 0;

        for site in sites {
            veeam_tb += site.veeam_tb;
            wasabi_active_tb += site.wasabi_active_tb;
            wasabi_deleted_tb += site.wasabi_deleted_tb;
            costs.add(&CostBreakdown {
                active_cost: site.active_cost,
                deleted_cost: site.deleted_cost,
                total_cost: site.total_cost,
            });
            jobs.add(&site.jobs);
            bdr_count += site.bdr_count;
            bucket_count += site.bucket_count;
        }

        DailySummary {
            report_date,
            veeam_tb,
            wasabi_active_tb,
            wasabi_deleted_tb,
            discrepancy_pct: discrepancy_pct(veeam_tb, wasabi_active_tb),
            active_cost: costs.active_cost,
            deleted_cost: costs.deleted_cost,
            total_cost: costs.total_cost,
            total_jobs: jobs.total_jobs,
            successful_jobs: jobs.successful_jobs,
            failed_jobs: jobs.failed_jobs,
            warning_jobs: jobs.warning_jobs,
            success_rate_pct: success_rate_pct(jobs.successful_jobs, jobs.total_jobs),
            low_disk_count: count(bdrs.iter().filter(|b| is_low_disk(b, self.settings))),
            high_discrepancy_count: count(
                sites.iter().filter(|s| is_high_discrepancy(s, self.settings)),
            ),
            high_deleted_count: count(
                buckets
                    .iter()
                    .filter(|b| is_high_deleted_ratio(b, self.settings)),
            ),
            site_count: count(sites.iter()),
            bdr_count,
            bucket_count,
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn invalid_job(job: &VeeamJobRow) -> Option<String> {
    if job.bdr_server.trim().is_empty() {
        return Some("job row without BDR server".to_string());
    }
    match job.success_rate_24h {
        Some(rate) if !rate.is_finite() => {
            Some(format!("job {} has non-finite success rate", job.job_name))
        }
        _ => None,
    }
}

fn job_source(job: &VeeamJobRow) -> String {
    if job.bdr_server.trim().is_empty() {
        "veeam".to_string()
    } else {
        job.bdr_server.clone()
    }
}

fn count<T>(iter: impl Iterator<Item = T>) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::models::{BdrCapacityRow, BucketUsageRow};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 28).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn capacity(server: &str, backup_gb: f64, free_gb: f64) -> BdrCapacityRow {
        BdrCapacityRow {
            bdr_server: server.to_string(),
            backup_size_gb: backup_gb,
            disk_free_gb: free_gb,
        }
    }

    fn job(
        server: &str,
        rate: Option<f64>,
        result: Option<&str>,
        mode: Option<&str>,
        schedule: Option<&str>,
    ) -> VeeamJobRow {
        VeeamJobRow {
            bdr_server: server.to_string(),
            job_name: format!("{server} job"),
            success_rate_24h: rate,
            last_result: result.map(str::to_string),
            backup_mode: mode.map(str::to_string),
            schedule: schedule.map(str::to_string),
        }
    }

    fn bucket(name: &str, active_tb: f64, deleted_tb: f64) -> BucketUsageRow {
        BucketUsageRow {
            bucket_name: name.to_string(),
            active_tb,
            deleted_tb,
        }
    }

    /// Two sites: AJC (two BDRs, balanced) and HBC (one BDR, 30 % short).
    fn sample_batch() -> IngestBatch {
        IngestBatch {
            bdr_rows: vec![
                capacity("AJC-BDR3", 2048.0, 1024.0),
                capacity("AJC-BDR4", 1024.0, 102.4),
                capacity("HBC-BDR1", 5120.0, 5120.0),
            ],
            job_rows: vec![
                job("AJC-BDR3", Some(100.0), None, Some("Incremental"), Some("Daily")),
                job(
                    "AJC-BDR3",
                    None,
                    Some("Failed"),
                    Some("Reverse Incremental"),
                    Some("Weekly"),
                ),
                job("HBC-BDR1", Some(60.0), None, None, None),
            ],
            bucket_rows: vec![
                bucket("ajc-veeam", 3.0, 0.5),
                bucket("hbc-veeam", 3.5, 2.5),
                bucket("AJC-Archive", 100.0, 100.0),
            ],
            issues: Vec::new(),
        }
    }

    fn compute(batch: &IngestBatch) -> MetricsOutput {
        let settings = AuditSettings::default();
        MetricsComputer::new(&settings)
            .compute(day(), batch)
            .expect("metrics")
    }

    // ── per-record metrics ────────────────────────────────────────────────────

    #[test]
    fn test_bdr_records() {
        let out = compute(&sample_batch());
        let bdrs = &out.snapshot.bdrs;
        assert_eq!(bdrs.len(), 3);
        assert_eq!(bdrs[0].bdr_server, "AJC-BDR3");
        assert_eq!(bdrs[0].site_code, "AJC");
        assert!(approx(bdrs[0].backup_size_tb, 2.0));
        assert!(approx(bdrs[0].disk_free_tb, 1.0));
        assert!(approx(bdrs[0].disk_free_pct, 100.0 / 3.0));
    }

    #[test]
    fn test_bucket_records_filtered_and_priced() {
        let out = compute(&sample_batch());
        let buckets = &out.snapshot.buckets;
        assert_eq!(buckets.len(), 2);
        assert_eq!(out.filtered_buckets, 1);
        assert_eq!(buckets[0].bucket_name, "ajc-veeam");
        assert!(approx(buckets[0].active_cost, 3.0 * 6.99 * 1.0685));
        assert!(approx(buckets[0].deleted_cost, 0.5 * 6.99 * 1.0685));
        assert!(approx(
            buckets[0].total_cost,
            buckets[0].active_cost + buckets[0].deleted_cost
        ));
    }

    #[test]
    fn test_site_records() {
        let out = compute(&sample_batch());
        let ajc = out.snapshot.site("AJC").unwrap();
        assert!(approx(ajc.veeam_tb, 3.0));
        assert!(approx(ajc.wasabi_active_tb, 3.0));
        assert!(approx(ajc.discrepancy_pct, 0.0));
        assert_eq!(ajc.bdr_count, 2);
        assert_eq!(ajc.bucket_count, 1);
        assert_eq!(ajc.jobs.total_jobs, 2);
        assert_eq!(ajc.jobs.successful_jobs, 1);
        assert_eq!(ajc.jobs.failed_jobs, 1);
        assert_eq!(ajc.jobs.increment_jobs, 1);
        assert_eq!(ajc.jobs.reverse_increment_jobs, 1);
        assert_eq!(ajc.jobs.gold_jobs, 1);
        assert_eq!(ajc.jobs.silver_jobs, 1);
        assert!(approx(ajc.success_rate_pct.unwrap(), 50.0));

        let hbc = out.snapshot.site("HBC").unwrap();
        assert!(approx(hbc.discrepancy_pct, 30.0));
        assert_eq!(hbc.jobs.warning_jobs, 1);
        // No schedule hints: every job counts as gold.
        assert_eq!(hbc.jobs.gold_jobs, 1);
    }

    #[test]
    fn test_site_only_in_wasabi() {
        let batch = IngestBatch {
            bucket_rows: vec![bucket("xyz-veeam", 2.0, 0.0)],
            ..Default::default()
        };
        let out = compute(&batch);
        let xyz = out.snapshot.site("XYZ").unwrap();
        assert_eq!(xyz.veeam_tb, 0.0);
        assert!(approx(xyz.discrepancy_pct, 100.0));
        assert_eq!(xyz.success_rate_pct, None);
        assert_eq!(xyz.jobs.total_jobs, 0);
    }

    #[test]
    fn test_zero_storage_site_has_zero_discrepancy() {
        let batch = IngestBatch {
            bdr_rows: vec![capacity("AJC-BDR3", 0.0, 0.0)],
            bucket_rows: vec![bucket("ajc-veeam", 0.0, 0.0)],
            ..Default::default()
        };
        let out = compute(&batch);
        assert_eq!(out.snapshot.sites[0].discrepancy_pct, 0.0);
        assert_eq!(out.snapshot.bdrs[0].disk_free_pct, 0.0);
    }

    // ── summary ───────────────────────────────────────────────────────────────

    #[test]
    fn test_summary_totals() {
        let out = compute(&sample_batch());
        let s = &out.snapshot.summary;
        assert!(approx(s.veeam_tb, 8.0));
        assert!(approx(s.wasabi_active_tb, 6.5));
        assert!(approx(s.wasabi_deleted_tb, 3.0));
        assert!(approx(s.discrepancy_pct, 18.75));
        assert!(approx(s.total_cost, 9.5 * 6.99 * 1.0685));
        assert_eq!(s.total_jobs, 3);
        assert_eq!(s.successful_jobs, 1);
        assert_eq!(s.failed_jobs, 1);
        assert_eq!(s.warning_jobs, 1);
        assert_eq!(s.site_count, 2);
        assert_eq!(s.bdr_count, 3);
        assert_eq!(s.bucket_count, 2);
    }

    #[test]
    fn test_summary_counts_use_thresholds() {
        let out = compute(&sample_batch());
        let s = &out.snapshot.summary;
        // AJC-BDR4 at ~9 % free.
        assert_eq!(s.low_disk_count, 1);
        // HBC at 30 %.
        assert_eq!(s.high_discrepancy_count, 1);
        // hbc-veeam deleted/active ≈ 0.71.
        assert_eq!(s.high_deleted_count, 1);
    }

    #[test]
    fn test_summary_equals_sum_of_sites() {
        let out = compute(&sample_batch());
        let snap = &out.snapshot;
        let veeam: f64 = snap.sites.iter().map(|s| s.veeam_tb).sum();
        let cost: f64 = snap.sites.iter().map(|s| s.total_cost).sum();
        let jobs: u32 = snap.sites.iter().map(|s| s.jobs.total_jobs).sum();
        assert!(approx(snap.summary.veeam_tb, veeam));
        assert!(approx(snap.summary.total_cost, cost));
        assert_eq!(snap.summary.total_jobs, jobs);
    }

    #[test]
    fn test_success_rate_none_without_jobs() {
        let batch = IngestBatch {
            bdr_rows: vec![capacity("AJC-BDR3", 10.0, 10.0)],
            ..Default::default()
        };
        let out = compute(&batch);
        assert_eq!(out.snapshot.summary.success_rate_pct, None);
    }

    // ── determinism ───────────────────────────────────────────────────────────

    #[test]
    fn test_output_is_byte_identical_across_runs() {
        let batch = sample_batch();
        let mut reversed = batch.clone();
        reversed.bdr_rows.reverse();
        reversed.bucket_rows.reverse();

        let a = serde_json::to_string(&compute(&batch).snapshot).unwrap();
        let b = serde_json::to_string(&compute(&batch).snapshot).unwrap();
        let c = serde_json::to_string(&compute(&reversed).snapshot).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    // ── filtering and issues ──────────────────────────────────────────────────

    #[test]
    fn test_empty_bucket_filter_admits_all() {
        let settings = AuditSettings::default();
        let out = MetricsComputer::new(&settings)
            .with_bucket_filter(BucketFilter::all())
            .compute(day(), &sample_batch())
            .unwrap();
        assert_eq!(out.snapshot.buckets.len(), 3);
        assert_eq!(out.filtered_buckets, 0);
    }

    #[test]
    fn test_bucket_filter_is_case_insensitive() {
        let filter = BucketFilter::new("VEEAM");
        assert!(filter.matches("ajc-veeam"));
        assert!(filter.matches("AJC-Veeam-Backups"));
        assert!(!filter.matches("ajc-archive"));
    }

    #[test]
    fn test_invalid_rows_are_reported_not_fatal() {
        let mut batch = sample_batch();
        batch.bdr_rows.push(capacity("", 1.0, 1.0));
        batch.bdr_rows.push(capacity("MK-BDR1", f64::NAN, 1.0));
        batch.bdr_rows.push(capacity("AJC-BDR3", 1.0, 1.0));
        batch.bucket_rows.push(bucket("mk-veeam", f64::INFINITY, 0.0));
        batch.job_rows.push(job("MK-BDR1", Some(f64::NAN), None, None, None));
        batch.issues.push(InputIssue::new("reader", "carried over"));

        let out = compute(&batch);
        assert_eq!(out.issues.len(), 6);
        assert!(out.snapshot.site("MK").is_none());
        assert_eq!(out.snapshot.bdrs.len(), 3);
    }

    #[test]
    fn test_no_usable_rows_is_an_error() {
        let settings = AuditSettings::default();
        let batch = IngestBatch {
            bucket_rows: vec![bucket("archive", 1.0, 0.0)],
            ..Default::default()
        };
        let result = MetricsComputer::new(&settings).compute(day(), &batch);
        assert!(matches!(result, Err(AuditError::NoUsableData(d)) if d == day()));
    }

    #[test]
    fn test_custom_pricing_flows_into_costs() {
        let settings = AuditSettings {
            wasabi_cost_per_tb: 10.0,
            sales_tax_rate: 0.0,
            ..Default::default()
        };
        let out = MetricsComputer::new(&settings)
            .compute(day(), &sample_batch())
            .unwrap();
        assert!(approx(out.snapshot.summary.total_cost, 95.0));
    }
}
