//! SQLite data source.
//!
//! # Connection Formats
//! - `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - A bare file path ending in `.db`, `.sqlite` or `.sqlite3`
//! - `sqlite::memory:` (mostly useful in tests)
//!
//! Databases are opened read-only through a single-connection pool that
//! connects on first use.

use super::helpers::{Rendered, StreamCursor, map_sqlx_error, render_bytes};
use super::{DataSource, RowCursor, SourceType};
use crate::{Result, error::ExportError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row};
use std::str::FromStr;
use std::time::Duration;

/// Time allowed to open the database file.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only SQLite session
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    /// Creates a lazily-connecting source for `descriptor`.
    ///
    /// # Errors
    /// Returns a configuration error if the descriptor cannot be parsed.
    pub fn new(descriptor: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&normalize_descriptor(descriptor))
            .map_err(|e| ExportError::configuration(format!("Invalid SQLite descriptor: {}", e)))?
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Wraps an existing pool (for example an in-memory database).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn open_cursor<'a>(&'a mut self, query: &'a str) -> Result<Box<dyn RowCursor + 'a>> {
        // Describe first so the column list exists even for empty results
        let description = (&self.pool).describe(query).await.map_err(map_sqlx_error)?;
        let columns = description
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();

        let rows = sqlx::query(query).fetch(&self.pool);
        Ok(Box::new(StreamCursor::new(
            columns,
            rows,
            render_cell,
            map_sqlx_error,
        )))
    }

    async fn close(&mut self) {
        self.pool.close().await;
    }

    fn source_type(&self) -> SourceType {
        SourceType::SQLite
    }
}

/// Normalizes bare paths to the `sqlite://` URL form.
fn normalize_descriptor(descriptor: &str) -> String {
    let descriptor = descriptor.trim();
    if descriptor == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if descriptor.starts_with("sqlite:") {
        return descriptor.to_string();
    }
    format!("sqlite://{}", descriptor)
}

/// Renders a SQLite cell as text.
///
/// SQLite is dynamically typed, so storage classes are tried in order of
/// likelihood.
fn render_cell(row: &SqliteRow, index: usize) -> Rendered {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Some(v);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Some(v.map(|b| b.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return Some(v.map(|t| t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return Some(v.map(|d| d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Some(v.map(|bytes| render_bytes(&bytes)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_descriptor() {
        assert_eq!(normalize_descriptor("data/audit.db"), "sqlite://data/audit.db");
        assert_eq!(
            normalize_descriptor("sqlite:///var/audit.db"),
            "sqlite:///var/audit.db"
        );
        assert_eq!(normalize_descriptor(":memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_memory_source_streams_rows() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE people (id INTEGER, name TEXT, score REAL, photo BLOB, note TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO people VALUES (1, 'Ann', 2.5, x'6869', NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let mut source = SqliteSource::from_pool(pool);
        let mut cursor = source
            .open_cursor("SELECT id, name, score, photo, note FROM people")
            .await
            .unwrap();

        assert_eq!(cursor.columns(), ["id", "name", "score", "photo", "note"]);
        assert_eq!(
            cursor.next_row().await.unwrap(),
            Some(vec![
                Some("1".to_string()),
                Some("Ann".to_string()),
                Some("2.5".to_string()),
                Some("base64:aGk=".to_string()),
                None,
            ])
        );
        assert_eq!(cursor.next_row().await.unwrap(), None);
        drop(cursor);
        source.close().await;
    }

    #[tokio::test]
    async fn test_columns_known_for_empty_result() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE empty_table (a TEXT, b INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let mut source = SqliteSource::from_pool(pool);
        let mut cursor = source.open_cursor("SELECT * FROM empty_table").await.unwrap();

        assert_eq!(cursor.columns(), ["a", "b"]);
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_query_is_query_error() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let mut source = SqliteSource::from_pool(pool);
        let error = match source.open_cursor("SELECT * FROM missing_table").await {
            Ok(_) => panic!("query against a missing table must fail"),
            Err(error) => error,
        };

        assert!(matches!(error, ExportError::QueryExecution { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_fails_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        // Construction is lazy and succeeds
        let mut source = SqliteSource::new(&path.display().to_string()).unwrap();
        assert!(source.open_cursor("SELECT 1").await.is_err());
    }
}
