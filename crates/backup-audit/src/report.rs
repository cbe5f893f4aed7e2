//! Plain-text rendering of run outcomes, stored snapshots, exports and settings.

use std::fmt::Write as _;

use audit_core::formatting::{format_currency, format_number, format_pct, format_tb};
use audit_core::models::DailySnapshot;
use audit_core::settings::{AuditSettings, SettingKey};
use audit_core::time_utils::format_display_time;
use audit_runtime::{PipelineRun, ReportExport, RunOutcome};

/// Warnings listed before the remainder is summarised.
const MAX_LISTED_WARNINGS: usize = 10;

pub fn render_outcome(outcome: &RunOutcome) -> String {
    let mut out = render_run(&outcome.run);
    for p in &outcome.processed {
        let severity = p
            .highest_severity
            .map(|s| format!(" (highest {})", s.as_str()))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {}: {} anomalies{}, {} skipped rows",
            p.report_date, p.anomaly_count, severity, p.issue_count
        );
    }
    out
}

pub fn render_run(run: &PipelineRun) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Run {} [{}] started {} ({:.1}s)",
        run.target,
        run.status.as_str(),
        format_display_time(run.started_at),
        run.duration_secs()
    );
    if !run.report_dates.is_empty() {
        let dates: Vec<String> = run.report_dates.iter().map(|d| d.to_string()).collect();
        let _ = writeln!(out, "  dates: {}", dates.join(", "));
    }
    if let Some(error) = &run.error {
        let _ = writeln!(out, "  error: {error}");
    }
    for warning in run.warnings.iter().take(MAX_LISTED_WARNINGS) {
        let _ = writeln!(out, "  warning: {warning}");
    }
    if run.warnings.len() > MAX_LISTED_WARNINGS {
        let _ = writeln!(
            out,
            "  ... {} more warnings",
            run.warnings.len() - MAX_LISTED_WARNINGS
        );
    }
    out
}

pub fn render_snapshot(snapshot: &DailySnapshot) -> String {
    let s = &snapshot.summary;
    let mut out = String::new();
    let _ = writeln!(out, "Report date {}", snapshot.report_date);
    let _ = writeln!(
        out,
        "  sites {}  BDRs {}  buckets {}",
        s.site_count, s.bdr_count, s.bucket_count
    );
    let _ = writeln!(
        out,
        "  Veeam {}  Wasabi active {}  deleted {}  discrepancy {}",
        format_tb(s.veeam_tb),
        format_tb(s.wasabi_active_tb),
        format_tb(s.wasabi_deleted_tb),
        format_pct(Some(s.discrepancy_pct))
    );
    let _ = writeln!(
        out,
        "  cost {} (active {}, deleted {})",
        format_currency(s.total_cost),
        format_currency(s.active_cost),
        format_currency(s.deleted_cost)
    );
    let _ = writeln!(
        out,
        "  jobs {} ok / {} warning / {} failed, success {}",
        s.successful_jobs,
        s.warning_jobs,
        s.failed_jobs,
        format_pct(s.success_rate_pct)
    );
    let _ = writeln!(
        out,
        "  low disk {}  high discrepancy {}  high deleted {}",
        s.low_disk_count, s.high_discrepancy_count, s.high_deleted_count
    );

    if snapshot.anomalies.is_empty() {
        let _ = writeln!(out, "No anomalies.");
    } else {
        let _ = writeln!(out, "Anomalies ({}):", snapshot.anomalies.len());
        for a in &snapshot.anomalies {
            let _ = writeln!(
                out,
                "  {:<8} {:<18} {}",
                a.severity.as_str(),
                a.anomaly_type.as_str(),
                a.description
            );
        }
    }
    out
}

pub fn render_export(export: &ReportExport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Exported {} report dates ({} to {}) to {}",
        export.report_dates.len(),
        export.date_from,
        export.date_to,
        export.directory.display()
    );
    for file in &export.files {
        let _ = writeln!(out, "  {file}");
    }
    out
}

pub fn render_settings(settings: &AuditSettings) -> String {
    let width = SettingKey::ALL
        .iter()
        .map(|k| k.as_str().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for key in SettingKey::ALL {
        let value = settings.get(key);
        let marker = if value == key.default_value() { "" } else { "  *" };
        let _ = writeln!(
            out,
            "{:<width$}  {}{}",
            key.as_str(),
            format_number(value, 4),
            marker
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::models::{Anomaly, AnomalyType, DailySummary, Metric, Severity};
    use audit_runtime::RunStatus;
    use chrono::{NaiveDate, Utc};

    fn snapshot() -> DailySnapshot {
        let date = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
        DailySnapshot {
            report_date: date,
            summary: DailySummary {
                report_date: date,
                veeam_tb: 1536.256,
                wasabi_active_tb: 1500.0,
                wasabi_deleted_tb: 12.5,
                discrepancy_pct: 2.36,
                active_cost: 11203.22,
                deleted_cost: 93.36,
                total_cost: 11296.58,
                total_jobs: 10,
                successful_jobs: 8,
                failed_jobs: 1,
                warning_jobs: 1,
                success_rate_pct: Some(80.0),
                low_disk_count: 1,
                high_discrepancy_count: 0,
                high_deleted_count: 0,
                site_count: 4,
                bdr_count: 6,
                bucket_count: 4,
            },
            sites: Vec::new(),
            bdrs: Vec::new(),
            buckets: Vec::new(),
            anomalies: vec![Anomaly {
                report_date: date,
                severity: Severity::Critical,
                anomaly_type: AnomalyType::LowDisk,
                metric: Metric::DiskFreePct,
                subject: Some("AJC-BDR3".to_string()),
                previous_value: None,
                current_value: 4.2,
                change_pct: None,
                description: "AJC-BDR3 (AJC) has 4.2% disk free".to_string(),
            }],
        }
    }

    #[test]
    fn test_render_snapshot() {
        let text = render_snapshot(&snapshot());
        assert!(text.contains("Report date 2026-01-28"));
        assert!(text.contains("Veeam 1,536.26 TB"));
        assert!(text.contains("cost $11,296.58"));
        assert!(text.contains("success 80.0%"));
        assert!(text.contains("CRITICAL"));
        assert!(text.contains("low_disk"));
    }

    #[test]
    fn test_render_run_truncates_warnings() {
        let now = Utc::now();
        let run = PipelineRun {
            started_at: now,
            completed_at: now,
            target: "backfill".to_string(),
            report_dates: Vec::new(),
            status: RunStatus::CompletedWithWarnings,
            warnings: (0..15).map(|i| format!("w{i}")).collect(),
            error: None,
        };
        let text = render_run(&run);
        assert!(text.contains("[completed_with_warnings]"));
        assert!(text.contains("warning: w9"));
        assert!(!text.contains("warning: w10"));
        assert!(text.contains("5 more warnings"));
    }

    #[test]
    fn test_render_export() {
        let export = ReportExport {
            created_at: Utc::now(),
            date_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
            directory: std::path::PathBuf::from("reports/audit_report_2026-01-01_to_2026-01-28"),
            report_dates: vec![NaiveDate::from_ymd_opt(2026, 1, 28).unwrap()],
            files: vec!["summary.csv".to_string(), "sites.csv".to_string()],
        };
        let text = render_export(&export);
        assert!(text.starts_with("Exported 1 report dates (2026-01-01 to 2026-01-28)"));
        assert!(text.contains("audit_report_2026-01-01_to_2026-01-28"));
        assert!(text.contains("  sites.csv"));
    }

    #[test]
    fn test_render_settings_marks_overrides() {
        let mut settings = AuditSettings::default();
        settings.set(SettingKey::SalesTaxRate, 0.07).unwrap();
        let text = render_settings(&settings);
        let line = text
            .lines()
            .find(|l| l.starts_with("sales_tax_rate"))
            .unwrap();
        assert!(line.ends_with('*'));
        let line = text
            .lines()
            .find(|l| l.starts_with("wasabi_cost_per_tb"))
            .unwrap();
        assert!(line.contains("6.9900"));
        assert!(!line.ends_with('*'));
    }
}
