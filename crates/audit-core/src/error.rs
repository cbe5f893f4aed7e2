use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// All errors produced by the backup audit pipeline.
#[derive(Error, Debug)]
pub enum AuditError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV export could not be decoded.
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A date string did not match `YYYY-MM-DD`.
    #[error("Invalid report date: {0}")]
    InvalidDate(String),

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No CSV exports were found under the given directory.
    #[error("No CSV files found in {0}")]
    NoDataFiles(PathBuf),

    /// Every raw record for the date was unusable.
    #[error("No usable input data for {0}")]
    NoUsableData(NaiveDate),

    /// A requested date range holds no stored snapshot.
    #[error("No stored snapshots between {from} and {to}")]
    NoSnapshots { from: NaiveDate, to: NaiveDate },

    /// Another pipeline run holds the run lock.
    #[error("Pipeline already running (lock held at {0})")]
    AlreadyRunning(PathBuf),

    /// Writing to the metrics store failed; nothing was committed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuditError {
    /// `true` for the admission conflict raised when a run is already active.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AuditError::AlreadyRunning(_))
    }
}

/// Convenience alias used throughout the audit crates.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AuditError::FileRead {
            path: PathBuf::from("/data/VeeamFullAudit_AJC-BDR3.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("VeeamFullAudit_AJC-BDR3.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_invalid_date() {
        let err = AuditError::InvalidDate("2026-13-45".to_string());
        assert_eq!(err.to_string(), "Invalid report date: 2026-13-45");
    }

    #[test]
    fn test_error_display_no_usable_data() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
        let err = AuditError::NoUsableData(date);
        assert_eq!(err.to_string(), "No usable input data for 2026-01-28");
    }

    #[test]
    fn test_error_display_no_snapshots() {
        let err = AuditError::NoSnapshots {
            from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "No stored snapshots between 2026-01-01 and 2026-01-10"
        );
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_error_display_data_path_not_found() {
        let err = AuditError::DataPathNotFound(PathBuf::from("/missing/dir"));
        assert_eq!(err.to_string(), "Data path not found: /missing/dir");
    }

    #[test]
    fn test_error_display_no_data_files() {
        let err = AuditError::NoDataFiles(PathBuf::from("/empty/dir"));
        assert_eq!(err.to_string(), "No CSV files found in /empty/dir");
    }

    #[test]
    fn test_already_running_is_conflict() {
        let err = AuditError::AlreadyRunning(PathBuf::from("/store/pipeline.lock"));
        assert!(err.is_conflict());
        assert!(err.to_string().contains("already running"));

        let other = AuditError::Persistence("disk full".to_string());
        assert!(!other.is_conflict());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AuditError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: AuditError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
