//! Derived-metric formulas and the threshold predicates shared by the
//! daily summary counts and the anomaly detector.
//!
//! Every division is guarded; none of these functions can produce NaN from
//! finite inputs.

use crate::models::{BdrRecord, BucketRecord, SiteRecord};
use crate::settings::AuditSettings;

/// Floor for denominators so zero-over-zero resolves to zero.
pub const EPSILON: f64 = 1e-9;

/// Veeam exports sizes in binary GB.
pub const GB_PER_TB: f64 = 1024.0;

pub fn gb_to_tb(gb: f64) -> f64 {
    gb / GB_PER_TB
}

/// `|veeam − wasabi_active| / max(veeam, wasabi_active, ε) × 100`.
pub fn discrepancy_pct(veeam_tb: f64, wasabi_active_tb: f64) -> f64 {
    let denominator = veeam_tb.max(wasabi_active_tb).max(EPSILON);
    (veeam_tb - wasabi_active_tb).abs() / denominator * 100.0
}

/// Share of the backup volume that is still free; `0.0` for an empty volume.
pub fn disk_free_pct(disk_free_tb: f64, backup_size_tb: f64) -> f64 {
    let total = disk_free_tb + backup_size_tb;
    if total > 0.0 {
        disk_free_tb / total * 100.0
    } else {
        0.0
    }
}

/// Job success rate, `None` when no jobs ran.
pub fn success_rate_pct(successful_jobs: u32, total_jobs: u32) -> Option<f64> {
    if total_jobs == 0 {
        return None;
    }
    Some(f64::from(successful_jobs) / f64::from(total_jobs) * 100.0)
}

/// Deleted-to-active storage ratio.
pub fn deleted_ratio(deleted_tb: f64, active_tb: f64) -> f64 {
    deleted_tb / active_tb.max(EPSILON)
}

/// Absolute day-over-day change in percent of `previous`.
///
/// `None` when there is no positive baseline to compare against.
pub fn change_pct(previous: f64, current: f64) -> Option<f64> {
    if previous <= 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - previous).abs() / previous * 100.0)
}

// ── Threshold predicates ──────────────────────────────────────────────────────

/// Strictly below the low-disk threshold.
pub fn is_low_disk(bdr: &BdrRecord, settings: &AuditSettings) -> bool {
    bdr.disk_free_pct < settings.low_disk_threshold_pct
}

/// Strictly above the discrepancy threshold.
pub fn is_high_discrepancy(site: &SiteRecord, settings: &AuditSettings) -> bool {
    site.discrepancy_pct > settings.discrepancy_threshold_pct
}

/// Deleted storage strictly above `deleted_ratio_threshold` × active storage.
pub fn is_high_deleted_ratio(bucket: &BucketRecord, settings: &AuditSettings) -> bool {
    deleted_ratio(bucket.deleted_tb, bucket.active_tb) > settings.deleted_ratio_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bdr(disk_free_pct: f64) -> BdrRecord {
        BdrRecord {
            report_date: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
            bdr_server: "AJC-BDR3".to_string(),
            site_code: "AJC".to_string(),
            backup_size_tb: 1.0,
            disk_free_tb: 1.0,
            disk_free_pct,
        }
    }

    fn bucket(active_tb: f64, deleted_tb: f64) -> BucketRecord {
        BucketRecord {
            report_date: NaiveDate::from_ymd_opt(2026, 1, 28).unwrap(),
            bucket_name: "ajc-veeam".to_string(),
            site_code: "AJC".to_string(),
            active_tb,
            deleted_tb,
            active_cost: 0.0,
            deleted_cost: 0.0,
            total_cost: 0.0,
        }
    }

    // ── discrepancy ──────────────────────────────────────────────────────────

    #[test]
    fn test_discrepancy_both_zero_is_zero() {
        assert_eq!(discrepancy_pct(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_discrepancy_uses_larger_side() {
        let d = discrepancy_pct(10.0, 8.0);
        assert!((d - 20.0).abs() < 1e-9, "d = {d}");
        let d = discrepancy_pct(8.0, 10.0);
        assert!((d - 20.0).abs() < 1e-9, "d = {d}");
    }

    #[test]
    fn test_discrepancy_one_side_missing_is_full() {
        assert!((discrepancy_pct(5.0, 0.0) - 100.0).abs() < 1e-9);
        assert!((discrepancy_pct(0.0, 5.0) - 100.0).abs() < 1e-9);
    }

    // ── disk free ────────────────────────────────────────────────────────────

    #[test]
    fn test_disk_free_pct() {
        assert!((disk_free_pct(1.0, 3.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_disk_free_pct_empty_volume() {
        assert_eq!(disk_free_pct(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_gb_to_tb() {
        assert!((gb_to_tb(2048.0) - 2.0).abs() < 1e-12);
    }

    // ── success rate ─────────────────────────────────────────────────────────

    #[test]
    fn test_success_rate_none_without_jobs() {
        assert_eq!(success_rate_pct(0, 0), None);
    }

    #[test]
    fn test_success_rate_value() {
        let rate = success_rate_pct(3, 4).unwrap();
        assert!((rate - 75.0).abs() < 1e-9);
    }

    // ── change pct ───────────────────────────────────────────────────────────

    #[test]
    fn test_change_pct_needs_positive_baseline() {
        assert_eq!(change_pct(0.0, 10.0), None);
        assert_eq!(change_pct(-1.0, 10.0), None);
        let c = change_pct(10.0, 5.0).unwrap();
        assert!((c - 50.0).abs() < 1e-9);
    }

    // ── predicates ───────────────────────────────────────────────────────────

    #[test]
    fn test_low_disk_is_strict() {
        let settings = AuditSettings::default();
        assert!(!is_low_disk(&bdr(20.0), &settings));
        assert!(is_low_disk(&bdr(19.0), &settings));
    }

    #[test]
    fn test_high_deleted_ratio() {
        let settings = AuditSettings::default();
        assert!(!is_high_deleted_ratio(&bucket(10.0, 5.0), &settings));
        assert!(is_high_deleted_ratio(&bucket(10.0, 5.1), &settings));
        assert!(is_high_deleted_ratio(&bucket(0.0, 0.1), &settings));
        assert!(!is_high_deleted_ratio(&bucket(0.0, 0.0), &settings));
    }
}
