//! Data layer of the backup storage audit.
//!
//! Reads the Veeam and Wasabi CSV exports, derives the daily metrics and
//! flags anomalies against the configured thresholds.

pub mod anomaly;
pub mod metrics;
pub mod reader;

pub use anomaly::{AnomalyDetector, DetectionIssue, DetectionReport};
pub use metrics::{BucketFilter, MetricsComputer, MetricsOutput};

pub use audit_core as core;
