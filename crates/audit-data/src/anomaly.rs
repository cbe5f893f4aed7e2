//! Anomaly detection over one day's snapshot.
//!
//! Threshold rules look at the current day only. Day-over-day rules compare
//! against the preceding stored snapshot and are skipped when there is none.

use std::cmp::Ordering;

use audit_core::calculations::{
    change_pct, deleted_ratio, is_high_deleted_ratio, is_high_discrepancy, is_low_disk,
};
use audit_core::models::{
    Anomaly, AnomalyType, BdrRecord, BucketRecord, DailySnapshot, DailySummary, Metric,
    MetricKind, Severity, SiteRecord,
};
use audit_core::settings::AuditSettings;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A record the detector could not evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionIssue {
    /// BDR, site, bucket or `summary`.
    pub subject: String,
    pub detail: String,
}

/// Detector output for one report date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    /// Sorted by severity (most severe first), then type, subject and metric.
    pub anomalies: Vec<Anomaly>,
    pub issues: Vec<DetectionIssue>,
}

/// Rule engine; holds nothing but the run's settings.
pub struct AnomalyDetector<'a> {
    settings: &'a AuditSettings,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(settings: &'a AuditSettings) -> Self {
        Self { settings }
    }

    /// Evaluate every rule for `current`.
    ///
    /// `previous` is the closest stored snapshot before `current`; a
    /// snapshot that does not precede it is ignored.
    pub fn detect(&self, current: &DailySnapshot, previous: Option<&DailySnapshot>) -> DetectionReport {
        let mut report = DetectionReport::default();
        let date = current.report_date;

        let previous = previous.filter(|p| {
            let precedes = p.report_date < date;
            if !precedes {
                warn!(
                    current = %date,
                    previous = %p.report_date,
                    "Ignoring prior snapshot that does not precede the report date"
                );
            }
            precedes
        });

        for bdr in &current.bdrs {
            if !finite_bdr(bdr) {
                report.issue(&bdr.bdr_server, "non-finite capacity values");
                continue;
            }
            report.push(self.check_low_disk(date, bdr));
        }

        for site in &current.sites {
            if !finite_site(site) {
                report.issue(&site.site_code, "non-finite site metrics");
                continue;
            }
            report.push(self.check_discrepancy(date, site));
            report.push(self.check_site_failed_jobs(date, site));
            if let Some(prev_site) = previous.and_then(|p| p.site(&site.site_code)) {
                if finite_site(prev_site) {
                    self.check_site_swings(date, site, prev_site, &mut report);
                }
            }
        }

        for bucket in &current.buckets {
            if !(bucket.active_tb.is_finite() && bucket.deleted_tb.is_finite()) {
                report.issue(&bucket.bucket_name, "non-finite storage values");
                continue;
            }
            report.push(self.check_deleted_ratio(date, bucket));
        }

        match previous {
            Some(prev) if finite_summary(&current.summary) && finite_summary(&prev.summary) => {
                report.push(self.check_failed_job_spike(date, &current.summary, &prev.summary));
                self.check_aggregate_swings(date, &current.summary, &prev.summary, &mut report);
            }
            Some(_) => report.issue("summary", "non-finite daily summary"),
            None => debug!(date = %date, "No prior snapshot; day-over-day rules skipped"),
        }

        report.anomalies.sort_by(compare_anomalies);
        debug!(
            date = %date,
            anomalies = report.anomalies.len(),
            issues = report.issues.len(),
            "Anomaly detection finished"
        );
        report
    }

    // ── Threshold rules ───────────────────────────────────────────────────────

    fn check_low_disk(&self, date: NaiveDate, bdr: &BdrRecord) -> Option<Anomaly> {
        if !is_low_disk(bdr, self.settings) {
            return None;
        }
        let threshold = self.settings.low_disk_threshold_pct;
        let severity =
            if bdr.disk_free_pct < threshold * self.settings.low_disk_critical_fraction {
                Severity::Critical
            } else {
                Severity::High
            };
        Some(Anomaly {
            report_date: date,
            severity,
            anomaly_type: AnomalyType::LowDisk,
            metric: Metric::DiskFreePct,
            subject: Some(bdr.bdr_server.clone()),
            previous_value: None,
            current_value: bdr.disk_free_pct,
            change_pct: None,
            description: format!(
                "{} ({}) has {:.1}% disk free, below the {:.1}% threshold",
                bdr.bdr_server, bdr.site_code, bdr.disk_free_pct, threshold
            ),
        })
    }

    fn check_discrepancy(&self, date: NaiveDate, site: &SiteRecord) -> Option<Anomaly> {
        if !is_high_discrepancy(site, self.settings) {
            return None;
        }
        let threshold = self.settings.discrepancy_threshold_pct;
        let severity = if site.discrepancy_pct > threshold * self.escalation() {
            Severity::Critical
        } else {
            Severity::High
        };
        Some(Anomaly {
            report_date: date,
            severity,
            anomaly_type: AnomalyType::HighDiscrepancy,
            metric: Metric::DiscrepancyPct,
            subject: Some(site.site_code.clone()),
            previous_value: None,
            current_value: site.discrepancy_pct,
            change_pct: None,
            description: format!(
                "Site {}: Veeam reports {:.2} TB but Wasabi holds {:.2} TB active ({:.1}% discrepancy)",
                site.site_code, site.veeam_tb, site.wasabi_active_tb, site.discrepancy_pct
            ),
        })
    }

    fn check_deleted_ratio(&self, date: NaiveDate, bucket: &BucketRecord) -> Option<Anomaly> {
        if !is_high_deleted_ratio(bucket, self.settings) {
            return None;
        }
        let ratio = deleted_ratio(bucket.deleted_tb, bucket.active_tb);
        let severity = if ratio > self.settings.deleted_ratio_threshold * self.escalation() {
            Severity::High
        } else {
            Severity::Medium
        };
        Some(Anomaly {
            report_date: date,
            severity,
            anomaly_type: AnomalyType::HighDeletedRatio,
            metric: Metric::DeletedRatio,
            subject: Some(bucket.bucket_name.clone()),
            previous_value: None,
            current_value: ratio,
            change_pct: None,
            description: format!(
                "Bucket {} holds {:.2} TB deleted vs {:.2} TB active (ratio {:.2})",
                bucket.bucket_name, bucket.deleted_tb, bucket.active_tb, ratio
            ),
        })
    }

    fn check_site_failed_jobs(&self, date: NaiveDate, site: &SiteRecord) -> Option<Anomaly> {
        let failed = f64::from(site.jobs.failed_jobs);
        if failed <= 0.0 {
            return None;
        }
        let severity = if failed >= self.settings.site_failed_jobs_critical {
            Severity::Critical
        } else if failed >= self.settings.site_failed_jobs_high {
            Severity::High
        } else {
            return None;
        };
        Some(Anomaly {
            report_date: date,
            severity,
            anomaly_type: AnomalyType::SiteFailedJobs,
            metric: Metric::FailedJobs,
            subject: Some(site.site_code.clone()),
            previous_value: None,
            current_value: failed,
            change_pct: None,
            description: format!(
                "Site {}: {} of {} jobs failed",
                site.site_code, site.jobs.failed_jobs, site.jobs.total_jobs
            ),
        })
    }

    // ── Day-over-day rules ────────────────────────────────────────────────────

    fn check_failed_job_spike(
        &self,
        date: NaiveDate,
        current: &DailySummary,
        previous: &DailySummary,
    ) -> Option<Anomaly> {
        let prev = f64::from(previous.failed_jobs);
        let cur = f64::from(current.failed_jobs);
        let increase = cur - prev;
        let min_increase = self.settings.failed_job_spike_min_increase;
        if increase <= 0.0 || increase < min_increase {
            return None;
        }

        let factor = self.escalation();
        let (severity, pct) = if previous.failed_jobs == 0 {
            let severity = if increase >= min_increase * factor {
                Severity::High
            } else {
                Severity::Medium
            };
            (severity, None)
        } else {
            let pct = increase / prev * 100.0;
            let spike_pct = self.settings.failed_job_spike_pct;
            if pct < spike_pct {
                return None;
            }
            let severity = if pct >= spike_pct * factor {
                Severity::High
            } else {
                Severity::Medium
            };
            (severity, Some(pct))
        };

        let description = match pct {
            Some(p) => format!(
                "Failed jobs rose from {} to {} (+{:.1}%)",
                previous.failed_jobs, current.failed_jobs, p
            ),
            None => format!(
                "Failed jobs rose from 0 to {}",
                current.failed_jobs
            ),
        };
        Some(Anomaly {
            report_date: date,
            severity,
            anomaly_type: AnomalyType::FailedJobSpike,
            metric: Metric::FailedJobs,
            subject: None,
            previous_value: Some(prev),
            current_value: cur,
            change_pct: pct,
            description,
        })
    }

    fn check_aggregate_swings(
        &self,
        date: NaiveDate,
        current: &DailySummary,
        previous: &DailySummary,
        report: &mut DetectionReport,
    ) {
        // A different set of sites explains any aggregate movement.
        if current.site_count != previous.site_count {
            debug!(
                date = %date,
                previous = previous.site_count,
                current = current.site_count,
                "Site count changed; aggregate swing checks suppressed"
            );
            return;
        }
        for kind in MetricKind::ALL {
            report.push(self.check_swing(
                date,
                kind,
                None,
                kind.of_summary(previous),
                kind.of_summary(current),
            ));
        }
    }

    fn check_site_swings(
        &self,
        date: NaiveDate,
        current: &SiteRecord,
        previous: &SiteRecord,
        report: &mut DetectionReport,
    ) {
        if current.bdr_count != previous.bdr_count || current.bucket_count != previous.bucket_count {
            debug!(
                date = %date,
                site = %current.site_code,
                "Site membership changed; swing checks suppressed"
            );
            return;
        }
        for kind in MetricKind::ALL {
            report.push(self.check_swing(
                date,
                kind,
                Some(&current.site_code),
                kind.of_site(previous),
                kind.of_site(current),
            ));
        }
    }

    fn check_swing(
        &self,
        date: NaiveDate,
        kind: MetricKind,
        site_code: Option<&str>,
        previous: f64,
        current: f64,
    ) -> Option<Anomaly> {
        let pct = change_pct(previous, current)?;
        let threshold = self.settings.swing_threshold_pct(kind);
        if pct <= 0.0 || pct < threshold {
            return None;
        }
        let severity = if pct >= threshold * self.escalation() {
            Severity::Medium
        } else {
            Severity::Low
        };
        let direction = if current > previous { "increased" } else { "decreased" };
        let prefix = site_code.map(|c| format!("Site {c}: ")).unwrap_or_default();
        Some(Anomaly {
            report_date: date,
            severity,
            anomaly_type: AnomalyType::MetricSwing,
            metric: Metric::from(kind),
            subject: site_code.map(str::to_string),
            previous_value: Some(previous),
            current_value: current,
            change_pct: Some(pct),
            description: format!(
                "{prefix}{} {direction} by {pct:.1}% (from {previous:.4} to {current:.4})",
                kind.label()
            ),
        })
    }

    fn escalation(&self) -> f64 {
        self.settings.severity_escalation_factor
    }
}

impl DetectionReport {
    fn push(&mut self, anomaly: Option<Anomaly>) {
        if let Some(a) = anomaly {
            self.anomalies.push(a);
        }
    }

    fn issue(&mut self, subject: &str, detail: &str) {
        warn!(subject, detail, "Skipping record during anomaly detection");
        self.issues.push(DetectionIssue {
            subject: subject.to_string(),
            detail: detail.to_string(),
        });
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn compare_anomalies(a: &Anomaly, b: &Anomaly) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.anomaly_type.cmp(&b.anomaly_type))
        .then_with(|| a.subject.cmp(&b.subject))
        .then_with(|| a.metric.cmp(&b.metric))
}

fn finite_bdr(bdr: &BdrRecord) -> bool {
    [bdr.backup_size_tb, bdr.disk_free_tb, bdr.disk_free_pct]
        .iter()
        .all(|v| v.is_finite())
}

fn finite_site(site: &SiteRecord) -> bool {
    [
        site.veeam_tb,
        site.wasabi_active_tb,
        site.wasabi_deleted_tb,
        site.discrepancy_pct,
        site.total_cost,
    ]
    .iter()
    .all(|v| v.is_finite())
}

fn finite_summary(summary: &DailySummary) -> bool {
    MetricKind::ALL
        .iter()
        .all(|k| k.of_summary(summary).is_finite())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
