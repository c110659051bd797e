//! Outcome and report models produced by the export engine.
//!
//! These values are the reporting surface consumed by whatever invokes the
//! engine: every table export yields an [`ExportOutcome`], wrapped in a
//! [`TableReport`], aggregated into a [`DatabaseReport`] and finally a
//! [`JobReport`]. All of them serialize to JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a single table export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportStatus {
    /// Every row written, no cell failed to decrypt
    Succeeded,
    /// Every row written, at least one cell kept its raw value
    SucceededWithErrors,
    /// The export aborted; output may be partial or absent
    Failed,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStatus::Succeeded => write!(f, "succeeded"),
            ExportStatus::SucceededWithErrors => write!(f, "succeeded with errors"),
            ExportStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A cell on a decryptable column that failed to decrypt.
///
/// `row_number` counts data rows from 1; `column_index` is the 0-based
/// result-set position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    /// Data row, counted from 1
    pub row_number: u64,
    /// Result-set position, counted from 0
    pub column_index: usize,
    pub column_name: String,
    /// Why the value did not decrypt
    pub message: String,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row {}, Column {} ({}): {}",
            self.row_number, self.column_index, self.column_name, self.message
        )
    }
}

/// Outcome of exporting one table.
///
/// Created empty when the export starts, mutated while rows stream, and
/// finalized through [`ExportOutcome::finish`] or [`ExportOutcome::fail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub status: ExportStatus,
    /// Data rows handed to the sink, header excluded.
    ///
    /// Counted as each row enters the output buffer. When the export fails
    /// on a sink error, the tail of these rows may not have reached storage.
    pub rows_written: u64,
    pub errors: Vec<CellError>,
    /// Descriptive reason when `status` is `Failed`
    pub failure: Option<String>,
}

impl Default for ExportOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOutcome {
    /// Creates an in-progress outcome with nothing recorded yet.
    pub fn new() -> Self {
        Self {
            status: ExportStatus::Succeeded,
            rows_written: 0,
            errors: Vec::new(),
            failure: None,
        }
    }

    /// Creates a failed outcome for an export that never reached its rows.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new().fail(reason)
    }

    /// Records a cell that kept its raw value.
    pub fn record_cell_error(&mut self, error: CellError) {
        self.errors.push(error);
    }

    /// Finalizes a completed export.
    pub fn finish(mut self) -> Self {
        self.status = if self.errors.is_empty() {
            ExportStatus::Succeeded
        } else {
            ExportStatus::SucceededWithErrors
        };
        self
    }

    /// Finalizes an aborted export, keeping rows and errors counted so far.
    pub fn fail(mut self, reason: impl Into<String>) -> Self {
        self.status = ExportStatus::Failed;
        self.failure = Some(reason.into());
        self
    }

    /// True unless the export aborted.
    pub fn is_success(&self) -> bool {
        self.status != ExportStatus::Failed
    }

    /// Human-readable summary listing at most `max_errors` cell errors.
    pub fn summary(&self, max_errors: usize) -> String {
        let mut lines = vec![format!(
            "{}: {} rows written, {} decryption errors",
            self.status,
            self.rows_written,
            self.errors.len()
        )];

        if let Some(reason) = &self.failure {
            lines.push(format!("  reason: {}", reason));
        }

        for error in self.errors.iter().take(max_errors) {
            lines.push(format!("  {}", error));
        }

        let hidden = self.errors.len().saturating_sub(max_errors);
        if hidden > 0 {
            lines.push(format!("  ... {} more", hidden));
        }

        lines.join("\n")
    }
}

/// Result of exporting one configured table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table_name: String,
    /// Output file as configured
    pub output_path: String,
    /// The query that was actually executed
    pub query: String,
    pub outcome: ExportOutcome,
    /// Wall-clock time of the export, output file creation included
    pub duration_ms: u64,
}

/// Result of exporting every table of one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseReport {
    /// Connection descriptor with credentials redacted
    pub connection: String,
    pub tables: Vec<TableReport>,
    /// Set when no session could be opened for this database
    pub failure: Option<String>,
}

impl DatabaseReport {
    /// Number of tables whose export did not abort.
    pub fn tables_succeeded(&self) -> usize {
        self.tables.iter().filter(|t| t.outcome.is_success()).count()
    }

    /// Number of tables whose export aborted.
    pub fn tables_failed(&self) -> usize {
        self.tables.len() - self.tables_succeeded()
    }

    /// Rows written across all tables.
    pub fn rows_written(&self) -> u64 {
        self.tables.iter().map(|t| t.outcome.rows_written).sum()
    }

    /// Cell errors recorded across all tables.
    pub fn cell_errors(&self) -> usize {
        self.tables.iter().map(|t| t.outcome.errors.len()).sum()
    }

    /// True when the session opened and no table aborted.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.tables_failed() == 0
    }
}

/// Result of a full export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub total_duration_ms: u64,
    pub exporter_version: String,
    pub databases: Vec<DatabaseReport>,
}

impl JobReport {
    /// True when every database opened and every table completed.
    pub fn is_success(&self) -> bool {
        self.databases.iter().all(DatabaseReport::is_success)
    }

    /// Failed tables across all databases.
    pub fn tables_failed(&self) -> usize {
        self.databases.iter().map(DatabaseReport::tables_failed).sum()
    }

    /// Rows written across all databases.
    pub fn rows_written(&self) -> u64 {
        self.databases.iter().map(DatabaseReport::rows_written).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_error(row_number: u64) -> CellError {
        CellError {
            row_number,
            column_index: 1,
            column_name: "ssn".to_string(),
            message: "not encrypted".to_string(),
        }
    }

    #[test]
    fn test_finish_without_errors_succeeds() {
        let mut outcome = ExportOutcome::new();
        outcome.rows_written = 3;
        let outcome = outcome.finish();

        assert_eq!(outcome.status, ExportStatus::Succeeded);
        assert!(outcome.failure.is_none());
    }

    #[test]
    fn test_finish_with_errors() {
        let mut outcome = ExportOutcome::new();
        outcome.record_cell_error(cell_error(2));
        let outcome = outcome.finish();

        assert_eq!(outcome.status, ExportStatus::SucceededWithErrors);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_fail_keeps_progress() {
        let mut outcome = ExportOutcome::new();
        outcome.rows_written = 7;
        outcome.record_cell_error(cell_error(4));
        let outcome = outcome.fail("disk full");

        assert_eq!(outcome.status, ExportStatus::Failed);
        assert_eq!(outcome.rows_written, 7);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.failure.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_summary_truncates_errors() {
        let mut outcome = ExportOutcome::new();
        outcome.rows_written = 5;
        for row in 2..=5 {
            outcome.record_cell_error(cell_error(row));
        }
        let summary = outcome.finish().summary(2);

        assert!(summary.starts_with("succeeded with errors: 5 rows written, 4 decryption errors"));
        assert!(summary.contains("Row 2, Column 1 (ssn): not encrypted"));
        assert!(summary.contains("Row 3, Column 1"));
        assert!(!summary.contains("Row 4"));
        assert!(summary.contains("... 2 more"));
    }

    #[test]
    fn test_database_report_aggregates() {
        let ok = TableReport {
            table_name: "a".to_string(),
            output_path: "a.csv".to_string(),
            query: "SELECT * FROM a".to_string(),
            outcome: {
                let mut outcome = ExportOutcome::new();
                outcome.rows_written = 10;
                outcome.record_cell_error(cell_error(3));
                outcome.finish()
            },
            duration_ms: 1,
        };
        let failed = TableReport {
            table_name: "b".to_string(),
            output_path: "b.csv".to_string(),
            query: "SELECT * FROM b".to_string(),
            outcome: ExportOutcome::failed("no such table"),
            duration_ms: 1,
        };
        let report = DatabaseReport {
            connection: "sqlite://test.db".to_string(),
            tables: vec![ok, failed],
            failure: None,
        };

        assert_eq!(report.tables_succeeded(), 1);
        assert_eq!(report.tables_failed(), 1);
        assert_eq!(report.rows_written(), 10);
        assert_eq!(report.cell_errors(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = ExportOutcome::failed("boom");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "Failed");
        assert_eq!(json["failure"], "boom");
    }
}
