//! Table export coordination for one database session.

use super::rows::export_rows;
use crate::adapters::DataSource;
use crate::config::{DatabaseConfig, TableConfig};
use crate::error::ExportError;
use crate::models::{ExportOutcome, TableReport};
use crate::query::resolve_query;
use crate::security::Decryptor;
use crate::Result;
use std::path::Path;
use std::time::Instant;

/// Exports one table: resolves its query, opens the output file and
/// streams the rows into it.
///
/// The output file is created (or truncated) before the query runs, along
/// with any missing parent directories. Failing to open it yields a `Failed`
/// outcome; nothing is returned as an error.
pub async fn export_table(
    source: &mut dyn DataSource,
    default_query: Option<&str>,
    table: &TableConfig,
    decryptor: &dyn Decryptor,
) -> TableReport {
    let started = Instant::now();
    let query = resolve_query(
        default_query,
        table.query_override.as_deref(),
        &table.table_name,
    );

    tracing::info!(
        "Exporting table '{}' to {}",
        table.table_name,
        table.output_path
    );
    tracing::debug!("Resolved query for '{}': {}", table.table_name, query);

    let outcome = match open_sink(Path::new(&table.output_path)).await {
        Ok(file) => export_rows(source, &query, file, decryptor).await,
        Err(e) => {
            tracing::warn!("Output for table '{}' unavailable: {}", table.table_name, e);
            ExportOutcome::failed(e.detailed())
        }
    };

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if outcome.is_success() {
        tracing::info!(
            "Table '{}' {}: {} rows, {} decryption errors ({} ms)",
            table.table_name,
            outcome.status,
            outcome.rows_written,
            outcome.errors.len(),
            duration_ms
        );
    } else {
        tracing::error!(
            "Table '{}' failed after {} rows: {}",
            table.table_name,
            outcome.rows_written,
            outcome.failure.as_deref().unwrap_or("unknown error")
        );
    }

    TableReport {
        table_name: table.table_name.clone(),
        output_path: table.output_path.clone(),
        query,
        outcome,
        duration_ms,
    }
}

/// Exports every configured table of `database`, in order, through
/// `source`.
///
/// A failed table never stops the loop. An empty table list returns an
/// empty report list and creates no files.
pub async fn export_database(
    source: &mut dyn DataSource,
    database: &DatabaseConfig,
    decryptor: &dyn Decryptor,
) -> Vec<TableReport> {
    let mut reports = Vec::with_capacity(database.tables.len());
    for table in &database.tables {
        let report =
            export_table(source, database.default_query.as_deref(), table, decryptor).await;
        reports.push(report);
    }
    reports
}

/// Creates or truncates the output file, creating parent directories.
async fn open_sink(path: &Path) -> Result<tokio::fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ExportError::connection_failed(
                format!("Cannot create output directory {}", parent.display()),
                e,
            )
        })?;
    }

    tokio::fs::File::create(path).await.map_err(|e| {
        ExportError::connection_failed(format!("Cannot open output file {}", path.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::{FakeSource, Script, row};
    use crate::models::ExportStatus;
    use crate::security::PrefixDecryptor;
    use tempfile::TempDir;

    fn output(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    #[tokio::test]
    async fn test_export_table_writes_file() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default().with(
            "SELECT * FROM people",
            Script::Rows(
                vec!["id", "ssn"],
                vec![Ok(row(&[Some("1"), Some("ENC:123-45-6789")]))],
            ),
        );
        let table = TableConfig::new("people", output(&dir, "nested/out/people.csv"));

        let report =
            export_table(&mut source, None, &table, &PrefixDecryptor::default()).await;

        assert_eq!(report.query, "SELECT * FROM people");
        assert_eq!(report.outcome.status, ExportStatus::Succeeded);
        let written = std::fs::read_to_string(dir.path().join("nested/out/people.csv")).unwrap();
        assert_eq!(written, "id,ssn\n1,123-45-6789\n");
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default()
            .with("SELECT * FROM t1", Script::Unreachable)
            .with(
                "SELECT * FROM t2",
                Script::Rows(vec!["a"], vec![Ok(row(&[Some("x")]))]),
            );
        let database = DatabaseConfig {
            connection_descriptor: "sqlite::memory:".to_string(),
            default_query: None,
            tables: vec![
                TableConfig::new("t1", output(&dir, "t1.csv")),
                TableConfig::new("t2", output(&dir, "t2.csv")),
            ],
        };

        let reports = export_database(&mut source, &database, &PrefixDecryptor::default()).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].table_name, "t1");
        assert_eq!(reports[0].outcome.status, ExportStatus::Failed);
        assert_eq!(reports[0].outcome.rows_written, 0);
        assert_eq!(reports[1].table_name, "t2");
        assert_eq!(reports[1].outcome.status, ExportStatus::Succeeded);
        assert_eq!(reports[1].outcome.rows_written, 1);
        assert_eq!(source.executed, ["SELECT * FROM t1", "SELECT * FROM t2"]);
    }

    #[tokio::test]
    async fn test_empty_table_list_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default();
        let database = DatabaseConfig {
            connection_descriptor: "sqlite::memory:".to_string(),
            default_query: Some("SELECT 1".to_string()),
            tables: Vec::new(),
        };

        let reports = export_database(&mut source, &database, &PrefixDecryptor::default()).await;

        assert!(reports.is_empty());
        assert!(source.executed.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_query_precedence_reaches_source() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default()
            .with("SELECT id FROM people", Script::Rows(vec!["id"], Vec::new()))
            .with("SELECT * FROM shared", Script::Rows(vec!["id"], Vec::new()));
        let database = DatabaseConfig {
            connection_descriptor: "sqlite::memory:".to_string(),
            default_query: Some("SELECT * FROM shared".to_string()),
            tables: vec![
                TableConfig::new("people", output(&dir, "people.csv"))
                    .with_query("SELECT id FROM people"),
                TableConfig::new("orders", output(&dir, "orders.csv")),
                TableConfig::new("blank", output(&dir, "blank.csv")).with_query("  "),
            ],
        };

        let reports = export_database(&mut source, &database, &PrefixDecryptor::default()).await;

        assert_eq!(
            source.executed,
            [
                "SELECT id FROM people",
                "SELECT * FROM shared",
                "SELECT * FROM shared"
            ]
        );
        assert!(reports.iter().all(|r| r.outcome.status == ExportStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_unopenable_output_is_failed_table() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is expected
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let mut source = FakeSource::default().with(
            "SELECT * FROM people",
            Script::Rows(vec!["id"], vec![Ok(row(&[Some("1")]))]),
        );
        let table = TableConfig::new("people", output(&dir, "blocker/people.csv"));

        let report =
            export_table(&mut source, None, &table, &PrefixDecryptor::default()).await;

        assert_eq!(report.outcome.status, ExportStatus::Failed);
        assert!(report.outcome.failure.unwrap().contains("Cannot create output directory"));
        // The query never ran
        assert!(source.executed.is_empty());
    }
}
