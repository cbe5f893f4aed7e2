//! CSV discovery and loading for the two audit exports.
//!
//! Veeam audits live in one folder per report date
//! (`<veeam_dir>/YYYY-MM-DD/VeeamFullAudit_<SERVER>_<YYYY-MM-DD>_<HHMMSS>.csv`),
//! Wasabi utilization in flat files
//! (`<wasabi_dir>/all-bucket-utilization-YYYY-MM-DD.csv`). Both are turned
//! into raw rows for the metrics computer; nothing is aggregated here.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use audit_core::error::{AuditError, Result};
use audit_core::models::{BdrCapacityRow, BucketUsageRow, IngestBatch, InputIssue, VeeamJobRow};
use audit_core::time_utils::{date_in_name, format_report_date, parse_report_date};
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

/// File-name prefix of a Veeam audit export.
pub const VEEAM_FILE_PREFIX: &str = "VeeamFullAudit_";

/// Marker every Wasabi utilization export carries in its file name.
pub const WASABI_FILE_MARKER: &str = "bucket-utilization";

// ── Raw CSV shapes ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VeeamCsvRow {
    #[serde(rename = "Job Name", default)]
    job_name: Option<String>,
    #[serde(rename = "Total Backup Size GB", default)]
    total_backup_size_gb: Option<String>,
    #[serde(rename = "Disk Free GB", default)]
    disk_free_gb: Option<String>,
    #[serde(rename = "Success Rate 24h %", default)]
    success_rate_24h: Option<String>,
    #[serde(rename = "Last Result", default)]
    last_result: Option<String>,
    #[serde(rename = "Backup Mode", default)]
    backup_mode: Option<String>,
    #[serde(rename = "Schedule", default)]
    schedule: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WasabiCsvRow {
    #[serde(rename = "BucketName", alias = "Bucket", default)]
    bucket_name: Option<String>,
    #[serde(rename = "BillableActiveStorageTB", default)]
    active_tb: Option<String>,
    #[serde(rename = "BillableDeletedStorageTB", default)]
    deleted_tb: Option<String>,
}

// ── Loaded exports ────────────────────────────────────────────────────────────

/// Everything read from one day's Veeam folder.
#[derive(Debug, Clone, Default)]
pub struct VeeamExport {
    pub bdr_rows: Vec<BdrCapacityRow>,
    pub job_rows: Vec<VeeamJobRow>,
    pub issues: Vec<InputIssue>,
    pub files_read: usize,
}

/// Everything read from the Wasabi utilization file used for a day.
#[derive(Debug, Clone, Default)]
pub struct WasabiExport {
    pub bucket_rows: Vec<BucketUsageRow>,
    pub issues: Vec<InputIssue>,
    /// File the rows came from.
    pub source: PathBuf,
}

/// Combine both exports into the batch the metrics computer consumes.
pub fn merge_exports(veeam: VeeamExport, wasabi: WasabiExport) -> IngestBatch {
    let mut issues = veeam.issues;
    issues.extend(wasabi.issues);
    IngestBatch {
        bdr_rows: veeam.bdr_rows,
        job_rows: veeam.job_rows,
        bucket_rows: wasabi.bucket_rows,
        issues,
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `.csv` files directly inside `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Data path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Every report date that has a Veeam folder, ascending.
pub fn list_report_dates(veeam_dir: &Path) -> Result<Vec<NaiveDate>> {
    if !veeam_dir.is_dir() {
        return Err(AuditError::DataPathNotFound(veeam_dir.to_path_buf()));
    }

    let mut dates: Vec<NaiveDate> = walkdir::WalkDir::new(veeam_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| entry.file_name().to_str().and_then(|n| parse_report_date(n).ok()))
        .collect();

    dates.sort();
    dates.dedup();
    Ok(dates)
}

/// The greatest report date with a Veeam folder.
pub fn latest_report_date(veeam_dir: &Path) -> Result<NaiveDate> {
    list_report_dates(veeam_dir)?
        .pop()
        .ok_or_else(|| AuditError::NoDataFiles(veeam_dir.to_path_buf()))
}

/// Veeam audit files for one report date.
pub fn find_veeam_files(veeam_dir: &Path, report_date: NaiveDate) -> Result<Vec<PathBuf>> {
    let folder = veeam_dir.join(format_report_date(report_date));
    if !folder.is_dir() {
        return Err(AuditError::DataPathNotFound(folder));
    }

    let files: Vec<PathBuf> = find_csv_files(&folder)
        .into_iter()
        .filter(|p| file_name(p).starts_with(VEEAM_FILE_PREFIX))
        .collect();

    if files.is_empty() {
        return Err(AuditError::NoDataFiles(folder));
    }
    Ok(files)
}

/// Wasabi file for a report date: the dated export when present, otherwise
/// the most recent utilization file dated on or before `report_date`.
pub fn find_wasabi_file(wasabi_dir: &Path, report_date: NaiveDate) -> Result<PathBuf> {
    if !wasabi_dir.is_dir() {
        return Err(AuditError::DataPathNotFound(wasabi_dir.to_path_buf()));
    }

    let exact = wasabi_dir.join(format!(
        "all-bucket-utilization-{}.csv",
        format_report_date(report_date)
    ));
    if exact.is_file() {
        return Ok(exact);
    }

    // Undated files and later exports are never substituted.
    let fallback = find_csv_files(wasabi_dir)
        .into_iter()
        .filter_map(|p| {
            let name = file_name(&p);
            if !name.contains(WASABI_FILE_MARKER) {
                return None;
            }
            date_in_name(&name)
                .filter(|d| *d <= report_date)
                .map(|d| (d, name, p))
        })
        .max_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)))
        .map(|(_, _, p)| p)
        .ok_or_else(|| AuditError::NoDataFiles(wasabi_dir.to_path_buf()))?;

    warn!(
        date = %report_date,
        file = %fallback.display(),
        "No dated Wasabi export; using most recent utilization file"
    );
    Ok(fallback)
}

/// Server name encoded in a Veeam export file name.
///
/// `VeeamFullAudit_AJC-BDR3_2026-01-28_101500.csv` → `AJC-BDR3`. Names
/// without the timestamp suffix yield everything after the prefix.
pub fn bdr_server_from_filename(name: &str) -> Option<String> {
    static SUFFIX_RE: OnceLock<Regex> = OnceLock::new();
    let re = SUFFIX_RE
        .get_or_init(|| Regex::new(r"^(.+?)_\d{4}-\d{2}-\d{2}_\d{6}$").expect("regex is valid"));

    let stem = name.strip_prefix(VEEAM_FILE_PREFIX)?;
    let stem = stem
        .strip_suffix(".csv")
        .or_else(|| stem.strip_suffix(".CSV"))
        .unwrap_or(stem);

    let server = match re.captures(stem).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => stem,
    };
    let server = server.trim();
    (!server.is_empty()).then(|| server.to_string())
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Read every Veeam export for `report_date`.
///
/// Files that cannot be opened or decoded are reported as issues; the day
/// fails with [`AuditError::NoUsableData`] when no file yields a BDR or job
/// row.
pub fn load_veeam_export(veeam_dir: &Path, report_date: NaiveDate) -> Result<VeeamExport> {
    let files = find_veeam_files(veeam_dir, report_date)?;
    let mut export = VeeamExport::default();

    for path in &files {
        match read_veeam_file(path) {
            Ok(file_export) => {
                export.files_read += 1;
                export.bdr_rows.extend(file_export.bdr_rows);
                export.job_rows.extend(file_export.job_rows);
                export.issues.extend(file_export.issues);
            }
            Err(e) => {
                warn!("Error loading {}: {}", path.display(), e);
                export
                    .issues
                    .push(InputIssue::new(file_name(path), e.to_string()));
            }
        }
    }

    if export.bdr_rows.is_empty() && export.job_rows.is_empty() {
        warn!(
            date = %report_date,
            files = files.len(),
            issues = export.issues.len(),
            "No Veeam data could be loaded"
        );
        return Err(AuditError::NoUsableData(report_date));
    }

    debug!(
        date = %report_date,
        files = files.len(),
        bdrs = export.bdr_rows.len(),
        jobs = export.job_rows.len(),
        "Loaded Veeam export"
    );
    Ok(export)
}

/// Read one Veeam export file.
///
/// The first decodable row with a size cell filled in carries the appliance
/// capacity; every row with a job name is a job row.
pub fn read_veeam_file(path: &Path) -> Result<VeeamExport> {
    let name = file_name(path);
    let bdr_server = bdr_server_from_filename(&name).ok_or_else(|| {
        AuditError::Other(anyhow::anyhow!("no BDR server in file name {name}"))
    })?;

    let mut reader = open_csv(path)?;
    let mut export = VeeamExport::default();

    for (index, record) in reader.deserialize::<VeeamCsvRow>().enumerate() {
        let line = index + 2;
        let row = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("Failed to parse row {} in {}: {}", line, name, e);
                export
                    .issues
                    .push(InputIssue::new(&name, format!("row {line}: {e}")));
                continue;
            }
        };

        if export.bdr_rows.is_empty() && has_capacity(&row) {
            match capacity_row(&bdr_server, &row) {
                Ok(capacity) => export.bdr_rows.push(capacity),
                Err(detail) => export
                    .issues
                    .push(InputIssue::new(&name, format!("row {line}: {detail}"))),
            }
        }

        let job_name = row.job_name.as_deref().map(str::trim).unwrap_or("");
        if job_name.is_empty() {
            export
                .issues
                .push(InputIssue::new(&name, format!("row {line}: blank job name")));
            continue;
        }

        let success_rate_24h = match optional_number(row.success_rate_24h.as_deref()) {
            Ok(rate) => rate,
            Err(raw) => {
                export.issues.push(InputIssue::new(
                    &name,
                    format!("row {line}: success rate {raw:?} is not a number"),
                ));
                None
            }
        };

        export.job_rows.push(VeeamJobRow {
            bdr_server: bdr_server.clone(),
            job_name: job_name.to_string(),
            success_rate_24h,
            last_result: non_blank(row.last_result),
            backup_mode: non_blank(row.backup_mode),
            schedule: non_blank(row.schedule),
        });
    }

    export.files_read = 1;
    Ok(export)
}

/// Read the Wasabi utilization export used for `report_date`.
pub fn load_wasabi_export(wasabi_dir: &Path, report_date: NaiveDate) -> Result<WasabiExport> {
    let path = find_wasabi_file(wasabi_dir, report_date)?;
    let export = read_wasabi_file(&path)?;
    debug!(
        date = %report_date,
        file = %path.display(),
        buckets = export.bucket_rows.len(),
        "Loaded Wasabi export"
    );
    Ok(export)
}

/// Read one Wasabi utilization file.
pub fn read_wasabi_file(path: &Path) -> Result<WasabiExport> {
    let name = file_name(path);
    let mut reader = open_csv(path)?;
    let mut export = WasabiExport {
        source: path.to_path_buf(),
        ..Default::default()
    };

    for (index, record) in reader.deserialize::<WasabiCsvRow>().enumerate() {
        let line = index + 2;
        let row = match record {
            Ok(r) => r,
            Err(e) => {
                export
                    .issues
                    .push(InputIssue::new(&name, format!("row {line}: {e}")));
                continue;
            }
        };

        let Some(bucket_name) = non_blank(row.bucket_name) else {
            export
                .issues
                .push(InputIssue::new(&name, format!("row {line}: blank bucket name")));
            continue;
        };

        let parsed = required_number(row.active_tb.as_deref())
            .and_then(|active| required_number(row.deleted_tb.as_deref()).map(|d| (active, d)));
        match parsed {
            Ok((active_tb, deleted_tb)) => export.bucket_rows.push(BucketUsageRow {
                bucket_name,
                active_tb,
                deleted_tb,
            }),
            Err(raw) => export.issues.push(InputIssue::new(
                &name,
                format!("row {line}: bucket {bucket_name} has non-numeric storage {raw:?}"),
            )),
        }
    }

    Ok(export)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|source| AuditError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn capacity_row(bdr_server: &str, row: &VeeamCsvRow) -> std::result::Result<BdrCapacityRow, String> {
    let backup_size_gb = required_number(row.total_backup_size_gb.as_deref())
        .map_err(|raw| format!("backup size {raw:?} is not a number"))?;
    let disk_free_gb = required_number(row.disk_free_gb.as_deref())
        .map_err(|raw| format!("disk free {raw:?} is not a number"))?;
    Ok(BdrCapacityRow {
        bdr_server: bdr_server.to_string(),
        backup_size_gb,
        disk_free_gb,
    })
}

fn has_capacity(row: &VeeamCsvRow) -> bool {
    [&row.total_backup_size_gb, &row.disk_free_gb]
        .iter()
        .any(|cell| cell.as_deref().is_some_and(|v| !v.trim().is_empty()))
}

/// Parse an exported number; thousands separators and a trailing `%` are
/// accepted. `Err` carries the raw text.
fn parse_number(raw: &str) -> std::result::Result<f64, String> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    match cleaned.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(raw.to_string()),
    }
}

/// Blank cells count as zero.
fn required_number(raw: Option<&str>) -> std::result::Result<f64, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(s) => parse_number(s),
    }
}

/// Blank cells are absent.
fn optional_number(raw: Option<&str>) -> std::result::Result<Option<f64>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_number(s).map(Some),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
