//! Run targets and the record kept for every pipeline run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What a trigger asks the pipeline to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    /// One explicit report date.
    Date(NaiveDate),
    /// The most recent date with Veeam data.
    Latest,
    /// Every available date (optionally from `from` on), oldest first.
    Backfill { from: Option<NaiveDate> },
}

impl std::fmt::Display for RunTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunTarget::Date(d) => write!(f, "date {d}"),
            RunTarget::Latest => f.write_str("latest"),
            RunTarget::Backfill { from: Some(d) } => write!(f, "backfill from {d}"),
            RunTarget::Backfill { from: None } => f.write_str("backfill"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithWarnings => "completed_with_warnings",
            RunStatus::Failed => "failed",
        }
    }
}

/// Persisted record of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Human-readable trigger target.
    pub target: String,
    /// Dates committed by this run, ascending.
    pub report_dates: Vec<NaiveDate>,
    pub status: RunStatus,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PipelineRun {
    pub fn duration_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
