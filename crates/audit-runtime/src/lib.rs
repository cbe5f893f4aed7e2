//! Runtime layer of the backup storage audit.
//!
//! Owns persistence (the [`store::MetricsStore`] contract and its JSON and
//! in-memory implementations), the pipeline runner that turns a trigger
//! into committed daily snapshots, and CSV export of stored snapshots.

pub mod export;
pub mod pipeline;
pub mod run;
pub mod store;

pub use export::{export_report, ReportExport};
pub use pipeline::{PipelineConfig, PipelineRunner, ProcessedDate, RunOutcome};
pub use run::{PipelineRun, RunStatus, RunTarget};
pub use store::{JsonStore, MemoryStore, MetricsStore, RunLock};

pub use audit_core as core;
pub use audit_data as data;
