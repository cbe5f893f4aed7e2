use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::error::{AuditError, Result};
use crate::models::MetricKind;
use crate::time_utils::parse_report_date;

// ── Cli ────────────────────────────────────────────────────────────────────────

/// Backup storage audit: Veeam vs. Wasabi metrics and anomaly detection
#[derive(Parser, Debug, Clone)]
#[command(
    name = "backup-audit",
    about = "Backup storage audit: Veeam vs. Wasabi metrics and anomaly detection",
    version
)]
pub struct Cli {
    /// Directory holding one `YYYY-MM-DD` folder of Veeam audit CSVs per day
    #[arg(long, global = true, env = "BACKUP_AUDIT_VEEAM_DIR", default_value = "input_veeam_audits")]
    pub veeam_dir: PathBuf,

    /// Directory holding Wasabi bucket-utilization CSVs
    #[arg(long, global = true, env = "BACKUP_AUDIT_WASABI_DIR", default_value = "input_wasabi_utilization")]
    pub wasabi_dir: PathBuf,

    /// Metrics store directory (default: ~/.backup-audit/store)
    #[arg(long, global = true, env = "BACKUP_AUDIT_STORE")]
    pub store_dir: Option<PathBuf>,

    /// Only buckets whose name contains this text are audited (empty = all)
    #[arg(long, global = true, default_value = "veeam")]
    pub bucket_filter: String,

    /// Logging level
    #[arg(long, global = true, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Directory for daily pipeline log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Process one report date (default: the most recent available)
    Run {
        #[arg(long, value_parser = parse_report_date)]
        date: Option<NaiveDate>,
    },
    /// Process every available report date in ascending order
    Backfill {
        #[arg(long, value_parser = parse_report_date)]
        from: Option<NaiveDate>,
    },
    /// Show the most recent pipeline run
    Status,
    /// Print the stored summary and anomalies for a date (default: latest)
    Show {
        #[arg(value_parser = parse_report_date)]
        date: Option<NaiveDate>,
    },
    /// Write the stored tables for a date range as CSV files
    Export {
        /// First report date (default: earliest stored)
        #[arg(long, value_parser = parse_report_date)]
        from: Option<NaiveDate>,
        /// Last report date (default: latest stored)
        #[arg(long, value_parser = parse_report_date)]
        to: Option<NaiveDate>,
        /// Output directory (default: ~/.backup-audit/reports)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show or change audit thresholds and cost parameters
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SettingsAction {
    /// Print every setting with its effective value
    Show,
    /// Set a single numeric setting
    Set { key: SettingKey, value: f64 },
}

impl Cli {
    /// Parse arguments and apply `--debug`.
    pub fn load() -> Self {
        Self::resolve(Cli::parse())
    }

    /// Same as [`Cli::load`] for an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Cli::parse_from(args))
    }

    fn resolve(mut cli: Cli) -> Self {
        if cli.debug {
            cli.log_level = "DEBUG".to_string();
        }
        cli
    }

    /// Home of the audit state: `~/.backup-audit`.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".backup-audit")
    }

    /// Effective store directory.
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| Self::home_dir().join("store"))
    }

    /// Directory exports are written to when `export --out` is not given.
    pub fn reports_dir() -> PathBuf {
        Self::home_dir().join("reports")
    }

    /// Effective log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| Self::home_dir().join("logs"))
    }
}

// ── SettingKey ─────────────────────────────────────────────────────────────────

/// Every recognised audit setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    WasabiCostPerTb,
    SalesTaxRate,
    DiscrepancyThresholdPct,
    LowDiskThresholdPct,
    DeletedRatioThreshold,
    SeverityEscalationFactor,
    LowDiskCriticalFraction,
    FailedJobSpikePct,
    FailedJobSpikeMinIncrease,
    SiteFailedJobsHigh,
    SiteFailedJobsCritical,
    SwingVeeamTbPct,
    SwingWasabiActiveTbPct,
    SwingWasabiDeletedTbPct,
    SwingTotalCostPct,
}

impl SettingKey {
    pub const ALL: [SettingKey; 15] = [
        SettingKey::WasabiCostPerTb,
        SettingKey::SalesTaxRate,
        SettingKey::DiscrepancyThresholdPct,
        SettingKey::LowDiskThresholdPct,
        SettingKey::DeletedRatioThreshold,
        SettingKey::SeverityEscalationFactor,
        SettingKey::LowDiskCriticalFraction,
        SettingKey::FailedJobSpikePct,
        SettingKey::FailedJobSpikeMinIncrease,
        SettingKey::SiteFailedJobsHigh,
        SettingKey::SiteFailedJobsCritical,
        SettingKey::SwingVeeamTbPct,
        SettingKey::SwingWasabiActiveTbPct,
        SettingKey::SwingWasabiDeletedTbPct,
        SettingKey::SwingTotalCostPct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::WasabiCostPerTb => "wasabi_cost_per_tb",
            SettingKey::SalesTaxRate => "sales_tax_rate",
            SettingKey::DiscrepancyThresholdPct => "discrepancy_threshold_pct",
            SettingKey::LowDiskThresholdPct => "low_disk_threshold_pct",
            SettingKey::DeletedRatioThreshold => "deleted_ratio_threshold",
            SettingKey::SeverityEscalationFactor => "severity_escalation_factor",
            SettingKey::LowDiskCriticalFraction => "low_disk_critical_fraction",
            SettingKey::FailedJobSpikePct => "failed_job_spike_pct",
            SettingKey::FailedJobSpikeMinIncrease => "failed_job_spike_min_increase",
            SettingKey::SiteFailedJobsHigh => "site_failed_jobs_high",
            SettingKey::SiteFailedJobsCritical => "site_failed_jobs_critical",
            SettingKey::SwingVeeamTbPct => "swing_veeam_tb_pct",
            SettingKey::SwingWasabiActiveTbPct => "swing_wasabi_active_tb_pct",
            SettingKey::SwingWasabiDeletedTbPct => "swing_wasabi_deleted_tb_pct",
            SettingKey::SwingTotalCostPct => "swing_total_cost_pct",
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            SettingKey::WasabiCostPerTb => 6.99,
            SettingKey::SalesTaxRate => 0.0685,
            SettingKey::DiscrepancyThresholdPct => 20.0,
            SettingKey::LowDiskThresholdPct => 20.0,
            SettingKey::DeletedRatioThreshold => 0.5,
            SettingKey::SeverityEscalationFactor => 2.0,
            SettingKey::LowDiskCriticalFraction => 0.5,
            SettingKey::FailedJobSpikePct => 50.0,
            SettingKey::FailedJobSpikeMinIncrease => 3.0,
            SettingKey::SiteFailedJobsHigh => 3.0,
            SettingKey::SiteFailedJobsCritical => 5.0,
            SettingKey::SwingVeeamTbPct => 20.0,
            SettingKey::SwingWasabiActiveTbPct => 20.0,
            SettingKey::SwingWasabiDeletedTbPct => 50.0,
            SettingKey::SwingTotalCostPct => 25.0,
        }
    }
}

impl FromStr for SettingKey {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| AuditError::Config(format!("unknown setting key: {s}")))
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── AuditSettings ──────────────────────────────────────────────────────────────

/// Threshold and cost parameters for one pipeline run.
///
/// Loaded once at the start of a run and passed by reference into every
/// computation; the pipeline never writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditSettings {
    pub wasabi_cost_per_tb: f64,
    pub sales_tax_rate: f64,
    pub discrepancy_threshold_pct: f64,
    pub low_disk_threshold_pct: f64,
    pub deleted_ratio_threshold: f64,
    /// Multiplier on a threshold at which severity escalates one step.
    pub severity_escalation_factor: f64,
    /// Fraction of the low-disk threshold below which the disk is critical.
    pub low_disk_critical_fraction: f64,
    pub failed_job_spike_pct: f64,
    pub failed_job_spike_min_increase: f64,
    pub site_failed_jobs_high: f64,
    pub site_failed_jobs_critical: f64,
    pub swing_veeam_tb_pct: f64,
    pub swing_wasabi_active_tb_pct: f64,
    pub swing_wasabi_deleted_tb_pct: f64,
    pub swing_total_cost_pct: f64,
}

impl Default for AuditSettings {
    fn default() -> Self {
        use SettingKey::*;
        AuditSettings {
            wasabi_cost_per_tb: WasabiCostPerTb.default_value(),
            sales_tax_rate: SalesTaxRate.default_value(),
            discrepancy_threshold_pct: DiscrepancyThresholdPct.default_value(),
            low_disk_threshold_pct: LowDiskThresholdPct.default_value(),
            deleted_ratio_threshold: DeletedRatioThreshold.default_value(),
            severity_escalation_factor: SeverityEscalationFactor.default_value(),
            low_disk_critical_fraction: LowDiskCriticalFraction.default_value(),
            failed_job_spike_pct: FailedJobSpikePct.default_value(),
            failed_job_spike_min_increase: FailedJobSpikeMinIncrease.default_value(),
            site_failed_jobs_high: SiteFailedJobsHigh.default_value(),
            site_failed_jobs_critical: SiteFailedJobsCritical.default_value(),
            swing_veeam_tb_pct: SwingVeeamTbPct.default_value(),
            swing_wasabi_active_tb_pct: SwingWasabiActiveTbPct.default_value(),
            swing_wasabi_deleted_tb_pct: SwingWasabiDeletedTbPct.default_value(),
            swing_total_cost_pct: SwingTotalCostPct.default_value(),
        }
    }
}

impl AuditSettings {
    fn slot(&mut self, key: SettingKey) -> &mut f64 {
        match key {
            SettingKey::WasabiCostPerTb => &mut self.wasabi_cost_per_tb,
            SettingKey::SalesTaxRate => &mut self.sales_tax_rate,
            SettingKey::DiscrepancyThresholdPct => &mut self.discrepancy_threshold_pct,
            SettingKey::LowDiskThresholdPct => &mut self.low_disk_threshold_pct,
            SettingKey::DeletedRatioThreshold => &mut self.deleted_ratio_threshold,
            SettingKey::SeverityEscalationFactor => &mut self.severity_escalation_factor,
            SettingKey::LowDiskCriticalFraction => &mut self.low_disk_critical_fraction,
            SettingKey::FailedJobSpikePct => &mut self.failed_job_spike_pct,
            SettingKey::FailedJobSpikeMinIncrease => &mut self.failed_job_spike_min_increase,
            SettingKey::SiteFailedJobsHigh => &mut self.site_failed_jobs_high,
            SettingKey::SiteFailedJobsCritical => &mut self.site_failed_jobs_critical,
            SettingKey::SwingVeeamTbPct => &mut self.swing_veeam_tb_pct,
            SettingKey::SwingWasabiActiveTbPct => &mut self.swing_wasabi_active_tb_pct,
            SettingKey::SwingWasabiDeletedTbPct => &mut self.swing_wasabi_deleted_tb_pct,
            SettingKey::SwingTotalCostPct => &mut self.swing_total_cost_pct,
        }
    }

    pub fn get(&self, key: SettingKey) -> f64 {
        match key {
            SettingKey::WasabiCostPerTb => self.wasabi_cost_per_tb,
            SettingKey::SalesTaxRate => self.sales_tax_rate,
            SettingKey::DiscrepancyThresholdPct => self.discrepancy_threshold_pct,
            SettingKey::LowDiskThresholdPct => self.low_disk_threshold_pct,
            SettingKey::DeletedRatioThreshold => self.deleted_ratio_threshold,
            SettingKey::SeverityEscalationFactor => self.severity_escalation_factor,
            SettingKey::LowDiskCriticalFraction => self.low_disk_critical_fraction,
            SettingKey::FailedJobSpikePct => self.failed_job_spike_pct,
            SettingKey::FailedJobSpikeMinIncrease => self.failed_job_spike_min_increase,
            SettingKey::SiteFailedJobsHigh => self.site_failed_jobs_high,
            SettingKey::SiteFailedJobsCritical => self.site_failed_jobs_critical,
            SettingKey::SwingVeeamTbPct => self.swing_veeam_tb_pct,
            SettingKey::SwingWasabiActiveTbPct => self.swing_wasabi_active_tb_pct,
            SettingKey::SwingWasabiDeletedTbPct => self.swing_wasabi_deleted_tb_pct,
            SettingKey::SwingTotalCostPct => self.swing_total_cost_pct,
        }
    }

    /// Set one value. Negative and non-finite values are rejected.
    pub fn set(&mut self, key: SettingKey, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(AuditError::Config(format!(
                "{key} must be a non-negative number, got {value}"
            )));
        }
        *self.slot(key) = value;
        Ok(())
    }

    /// Swing threshold (percent) for a tracked metric.
    pub fn swing_threshold_pct(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::VeeamTb => self.swing_veeam_tb_pct,
            MetricKind::WasabiActiveTb => self.swing_wasabi_active_tb_pct,
            MetricKind::WasabiDeletedTb => self.swing_wasabi_deleted_tb_pct,
            MetricKind::TotalCost => self.swing_total_cost_pct,
        }
    }

    /// Build settings from a stored key/value map.
    ///
    /// Absent keys keep their defaults. Values may be a number, a numeric
    /// string or `{"value": n}`; anything else is ignored with a warning, as
    /// are unknown keys.
    pub fn from_values(values: &serde_json::Map<String, Value>) -> Self {
        let mut settings = Self::default();
        for (raw_key, raw_value) in values {
            let key = match raw_key.parse::<SettingKey>() {
                Ok(k) => k,
                Err(_) => {
                    tracing::debug!(key = %raw_key, "ignoring unknown setting");
                    continue;
                }
            };
            match numeric_value(raw_value) {
                Some(v) => {
                    if let Err(e) = settings.set(key, v) {
                        tracing::warn!(%key, error = %e, "keeping default for setting");
                    }
                }
                None => {
                    tracing::warn!(%key, value = %raw_value, "setting is not numeric; keeping default");
                }
            }
        }
        settings
    }

    /// Every setting as `key → value`, sorted by key name.
    pub fn to_values(&self) -> BTreeMap<String, f64> {
        SettingKey::ALL
            .into_iter()
            .map(|k| (k.as_str().to_string(), self.get(k)))
            .collect()
    }

    /// Load settings from a JSON object file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error so a broken configuration is never silently replaced.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(AuditError::FileRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(Self::from_values(&map)),
            other => Err(AuditError::Config(format!(
                "settings file {} must hold a JSON object, found {}",
                path.display(),
                other
            ))),
        }
    }

    /// Atomically write settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.to_values())?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Coerce a stored setting into a number.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("value").and_then(numeric_value),
        _ => None,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn map(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    // ── defaults ─────────────────────────────────────────────────────────────

    #[test]
    fn test_default_values() {
        let s = AuditSettings::default();
        assert_eq!(s.wasabi_cost_per_tb, 6.99);
        assert_eq!(s.sales_tax_rate, 0.0685);
        assert_eq!(s.discrepancy_threshold_pct, 20.0);
        assert_eq!(s.low_disk_threshold_pct, 20.0);
        assert_eq!(s.deleted_ratio_threshold, 0.5);
        assert_eq!(s.severity_escalation_factor, 2.0);
    }

    #[test]
    fn test_every_key_round_trips_through_get() {
        let s = AuditSettings::default();
        for key in SettingKey::ALL {
            assert_eq!(s.get(key), key.default_value(), "key {key}");
        }
    }

    // ── from_values ──────────────────────────────────────────────────────────

    #[test]
    fn test_from_values_accepts_stored_shapes() {
        let values = map(json!({
            "wasabi_cost_per_tb": 7.5,
            "sales_tax_rate": "0.07",
            "low_disk_threshold_pct": {"value": 15},
        }));
        let s = AuditSettings::from_values(&values);
        assert_eq!(s.wasabi_cost_per_tb, 7.5);
        assert_eq!(s.sales_tax_rate, 0.07);
        assert_eq!(s.low_disk_threshold_pct, 15.0);
        // Untouched keys keep defaults.
        assert_eq!(s.discrepancy_threshold_pct, 20.0);
    }

    #[test]
    fn test_from_values_ignores_unknown_and_invalid() {
        let values = map(json!({
            "theme": "dark",
            "deleted_ratio_threshold": "lots",
            "discrepancy_threshold_pct": -5,
        }));
        let s = AuditSettings::from_values(&values);
        assert_eq!(s, AuditSettings::default());
    }

    // ── set ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_set_rejects_negative_and_nan() {
        let mut s = AuditSettings::default();
        assert!(s.set(SettingKey::SalesTaxRate, -0.1).is_err());
        assert!(s.set(SettingKey::SalesTaxRate, f64::NAN).is_err());
        s.set(SettingKey::SalesTaxRate, 0.08).expect("valid value");
        assert_eq!(s.sales_tax_rate, 0.08);
    }

    #[test]
    fn test_setting_key_parse() {
        assert_eq!(
            "Wasabi_Cost_Per_TB".parse::<SettingKey>().unwrap(),
            SettingKey::WasabiCostPerTb
        );
        assert!("plan".parse::<SettingKey>().is_err());
    }

    #[test]
    fn test_swing_threshold_per_metric() {
        let s = AuditSettings::default();
        assert_eq!(s.swing_threshold_pct(MetricKind::VeeamTb), 20.0);
        assert_eq!(s.swing_threshold_pct(MetricKind::WasabiDeletedTb), 50.0);
        assert_eq!(s.swing_threshold_pct(MetricKind::TotalCost), 25.0);
    }

    // ── persistence ──────────────────────────────────────────────────────────

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested").join("settings.json");

        let mut s = AuditSettings::default();
        s.set(SettingKey::DiscrepancyThresholdPct, 30.0).unwrap();
        s.save_to(&path).expect("save");

        let loaded = AuditSettings::load_from(&path).expect("load");
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = AuditSettings::load_from(&tmp.path().join("absent.json")).expect("load");
        assert_eq!(loaded, AuditSettings::default());
    }

    #[test]
    fn test_load_rejects_non_object() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(AuditSettings::load_from(&path).is_err());
    }

    // ── cli ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::load_from_args(["backup-audit", "run"]);
        assert_eq!(cli.command, Command::Run { date: None });
        assert_eq!(cli.veeam_dir, PathBuf::from("input_veeam_audits"));
        assert_eq!(cli.wasabi_dir, PathBuf::from("input_wasabi_utilization"));
        assert_eq!(cli.bucket_filter, "veeam");
        assert_eq!(cli.log_level, "INFO");
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_run_with_date_and_debug() {
        let cli = Cli::load_from_args(["backup-audit", "run", "--date", "2026-01-28", "--debug"]);
        assert_eq!(
            cli.command,
            Command::Run {
                date: NaiveDate::from_ymd_opt(2026, 1, 28)
            }
        );
        assert_eq!(cli.log_level, "DEBUG");
    }

    #[test]
    fn test_cli_settings_set() {
        let cli = Cli::load_from_args([
            "backup-audit",
            "settings",
            "set",
            "low_disk_threshold_pct",
            "15",
        ]);
        assert_eq!(
            cli.command,
            Command::Settings {
                action: Some(SettingsAction::Set {
                    key: SettingKey::LowDiskThresholdPct,
                    value: 15.0,
                })
            }
        );
    }

    #[test]
    fn test_cli_export_range() {
        let cli = Cli::load_from_args([
            "backup-audit",
            "export",
            "--from",
            "2026-01-01",
            "--to",
            "2026-01-31",
            "--out",
            "reports",
        ]);
        assert_eq!(
            cli.command,
            Command::Export {
                from: NaiveDate::from_ymd_opt(2026, 1, 1),
                to: NaiveDate::from_ymd_opt(2026, 1, 31),
                out: Some(PathBuf::from("reports")),
            }
        );

        let cli = Cli::load_from_args(["backup-audit", "export"]);
        assert_eq!(
            cli.command,
            Command::Export {
                from: None,
                to: None,
                out: None
            }
        );
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        let result = Cli::try_parse_from(["backup-audit", "run", "--date", "28/01/2026"]);
        assert!(result.is_err());
    }
}
