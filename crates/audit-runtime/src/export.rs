//! CSV export of stored snapshots.
//!
//! One export covers a range of report dates and produces a directory of
//! tables (`summary.csv`, `sites.csv`, `bdrs.csv`, `buckets.csv`,
//! `anomalies.csv`), one row per record per date. Each export is recorded in
//! the store.

use std::path::{Path, PathBuf};

use audit_core::error::{AuditError, Result};
use audit_core::models::DailySnapshot;
use audit_core::time_utils::format_report_date;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::MetricsStore;

pub const SUMMARY_FILE: &str = "summary.csv";
pub const SITES_FILE: &str = "sites.csv";
pub const BDRS_FILE: &str = "bdrs.csv";
pub const BUCKETS_FILE: &str = "buckets.csv";
pub const ANOMALIES_FILE: &str = "anomalies.csv";

const SUMMARY_HEADERS: [&str; 13] = [
    "Date",
    "Veeam TB",
    "Wasabi Active TB",
    "Wasabi Deleted TB",
    "Discrepancy %",
    "Total Cost",
    "Low Disk",
    "High Discrepancy",
    "High Deleted",
    "Failed Jobs",
    "Warning Jobs",
    "Total Jobs",
    "Successful Jobs",
];

const SITE_HEADERS: [&str; 14] = [
    "Date",
    "Site Code",
    "Veeam TB",
    "Wasabi Active TB",
    "Wasabi Deleted TB",
    "Discrepancy %",
    "Total Cost",
    "Success Rate %",
    "Total Jobs",
    "Increment",
    "Reverse Inc",
    "Gold",
    "Silver",
    "Bronze",
];

const BDR_HEADERS: [&str; 6] = [
    "Date",
    "BDR Server",
    "Site Code",
    "Backup Size TB",
    "Disk Free TB",
    "Disk Free %",
];

const BUCKET_HEADERS: [&str; 8] = [
    "Date",
    "Bucket Name",
    "Site Code",
    "Active TB",
    "Deleted TB",
    "Active Cost",
    "Deleted Cost",
    "Total Cost",
];

const ANOMALY_HEADERS: [&str; 8] = [
    "Date",
    "Severity",
    "Type",
    "Subject",
    "Previous",
    "Current",
    "Change %",
    "Description",
];

/// Record kept for every export written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExport {
    pub created_at: DateTime<Utc>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    /// Directory holding the exported tables.
    pub directory: PathBuf,
    /// Report dates with a stored snapshot inside the range.
    pub report_dates: Vec<NaiveDate>,
    pub files: Vec<String>,
}

/// Directory name used for an export of `from..=to`.
pub fn export_dir_name(from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "audit_report_{}_to_{}",
        format_report_date(from),
        format_report_date(to)
    )
}

/// Export every stored snapshot between `from` and `to` (inclusive) into a
/// fresh directory under `out_dir`.
///
/// Open ends default to the earliest and latest stored dates. A previous
/// export of the same range is replaced.
pub fn export_report(
    store: &dyn MetricsStore,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    out_dir: &Path,
) -> Result<ReportExport> {
    let available = store.available_dates()?;
    let (Some(first), Some(last)) = (available.first().copied(), available.last().copied()) else {
        let today = Utc::now().date_naive();
        return Err(AuditError::NoSnapshots {
            from: from.unwrap_or(today),
            to: to.unwrap_or(today),
        });
    };

    let from = from.unwrap_or(first);
    let to = to.unwrap_or(last);
    if from > to {
        return Err(AuditError::Config(format!(
            "export range starts after it ends ({from} > {to})"
        )));
    }

    let mut snapshots = Vec::new();
    for date in available.into_iter().filter(|d| *d >= from && *d <= to) {
        if let Some(snapshot) = store.load_snapshot(date)? {
            snapshots.push(snapshot);
        }
    }
    if snapshots.is_empty() {
        return Err(AuditError::NoSnapshots { from, to });
    }

    std::fs::create_dir_all(out_dir)?;
    let directory = out_dir.join(export_dir_name(from, to));
    let staging = out_dir.join(format!(".{}.tmp", export_dir_name(from, to)));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    if let Err(e) = write_tables(&staging, &snapshots) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    // Tables are complete before they replace an earlier export of the range.
    if directory.exists() {
        std::fs::remove_dir_all(&directory)?;
    }
    std::fs::rename(&staging, &directory).map_err(|e| {
        let _ = std::fs::remove_dir_all(&staging);
        AuditError::Persistence(format!("failed to place {}: {e}", directory.display()))
    })?;

    let export = ReportExport {
        created_at: Utc::now(),
        date_from: from,
        date_to: to,
        directory,
        report_dates: snapshots.iter().map(|s| s.report_date).collect(),
        files: [SUMMARY_FILE, SITES_FILE, BDRS_FILE, BUCKETS_FILE, ANOMALIES_FILE]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    };
    store.record_export(&export)?;

    info!(
        from = %from,
        to = %to,
        dates = export.report_dates.len(),
        directory = %export.directory.display(),
        "Report exported"
    );
    Ok(export)
}

fn write_tables(dir: &Path, snapshots: &[DailySnapshot]) -> Result<()> {
    let mut summary = csv::Writer::from_path(dir.join(SUMMARY_FILE))?;
    let mut sites = csv::Writer::from_path(dir.join(SITES_FILE))?;
    let mut bdrs = csv::Writer::from_path(dir.join(BDRS_FILE))?;
    let mut buckets = csv::Writer::from_path(dir.join(BUCKETS_FILE))?;
    let mut anomalies = csv::Writer::from_path(dir.join(ANOMALIES_FILE))?;

    summary.write_record(SUMMARY_HEADERS)?;
    sites.write_record(SITE_HEADERS)?;
    bdrs.write_record(BDR_HEADERS)?;
    buckets.write_record(BUCKET_HEADERS)?;
    anomalies.write_record(ANOMALY_HEADERS)?;

    for snapshot in snapshots {
        let date = format_report_date(snapshot.report_date);
        let s = &snapshot.summary;
        summary.write_record([
            date.clone(),
            s.veeam_tb.to_string(),
            s.wasabi_active_tb.to_string(),
            s.wasabi_deleted_tb.to_string(),
            s.discrepancy_pct.to_string(),
            s.total_cost.to_string(),
            s.low_disk_count.to_string(),
            s.high_discrepancy_count.to_string(),
            s.high_deleted_count.to_string(),
            s.failed_jobs.to_string(),
            s.warning_jobs.to_string(),
            s.total_jobs.to_string(),
            s.successful_jobs.to_string(),
        ])?;

        for site in &snapshot.sites {
            let jobs = &site.jobs;
            sites.write_record([
                date.clone(),
                site.site_code.clone(),
                site.veeam_tb.to_string(),
                site.wasabi_active_tb.to_string(),
                site.wasabi_deleted_tb.to_string(),
                site.discrepancy_pct.to_string(),
                site.total_cost.to_string(),
                optional(site.success_rate_pct),
                jobs.total_jobs.to_string(),
                jobs.increment_jobs.to_string(),
                jobs.reverse_increment_jobs.to_string(),
                jobs.gold_jobs.to_string(),
                jobs.silver_jobs.to_string(),
                jobs.bronze_jobs.to_string(),
            ])?;
        }

        for bdr in &snapshot.bdrs {
            bdrs.write_record([
                date.clone(),
                bdr.bdr_server.clone(),
                bdr.site_code.clone(),
                bdr.backup_size_tb.to_string(),
                bdr.disk_free_tb.to_string(),
                bdr.disk_free_pct.to_string(),
            ])?;
        }

        for bucket in &snapshot.buckets {
            buckets.write_record([
                date.clone(),
                bucket.bucket_name.clone(),
                bucket.site_code.clone(),
                bucket.active_tb.to_string(),
                bucket.deleted_tb.to_string(),
                bucket.active_cost.to_string(),
                bucket.deleted_cost.to_string(),
                bucket.total_cost.to_string(),
            ])?;
        }

        for a in &snapshot.anomalies {
            anomalies.write_record([
                date.clone(),
                a.severity.as_str().to_string(),
                a.anomaly_type.as_str().to_string(),
                a.subject.clone().unwrap_or_default(),
                optional(a.previous_value),
                a.current_value.to_string(),
                optional(a.change_pct),
                a.description.clone(),
            ])?;
        }
    }

    for writer in [&mut summary, &mut sites, &mut bdrs, &mut buckets, &mut anomalies] {
        writer.flush()?;
    }
    debug!(dir = %dir.display(), snapshots = snapshots.len(), "Export tables written");
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
