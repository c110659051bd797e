//! Data-source traits and factory for streaming query results.
//!
//! An adapter turns a connection descriptor into a [`DataSource`]; a data
//! source executes one query at a time and hands back a forward-only
//! [`RowCursor`]. Cells are rendered to text by the adapter so the export
//! engine only ever sees `Option<String>` values.
//!
//! Sources connect lazily: creating one never touches the network, so a
//! connection failure is reported by the first [`DataSource::open_cursor`]
//! call and stays scoped to the table being exported.

use crate::{Result, error::ExportError, error::redact_connection_string};
use async_trait::async_trait;

pub(crate) mod helpers;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// One row of rendered cells; `None` is SQL NULL.
pub type RowValues = Vec<Option<String>>;

/// Supported source types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SourceType {
    PostgreSQL,
    SQLite,
    SqlServer,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::PostgreSQL => write!(f, "PostgreSQL"),
            SourceType::SQLite => write!(f, "SQLite"),
            SourceType::SqlServer => write!(f, "SQL Server"),
        }
    }
}

/// Forward-only cursor over a query result.
///
/// The column list is fixed when the cursor is opened and is available even
/// when the result has no rows.
#[async_trait]
pub trait RowCursor: Send {
    /// Result-set column names, in order
    fn columns(&self) -> &[String];

    /// Fetches the next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    /// Returns error if the source fails while streaming.
    async fn next_row(&mut self) -> Result<Option<RowValues>>;
}

/// A session against one source database.
///
/// # Security
/// - Implementations only execute the queries they are given (read-only use)
/// - Connection descriptors are never logged unredacted
#[async_trait]
pub trait DataSource: Send {
    /// Executes `query` and returns a cursor over its rows.
    ///
    /// The cursor borrows the source; it must be dropped before the next
    /// query is executed.
    ///
    /// # Errors
    /// Returns a connection error if the source cannot be reached and a
    /// query error if the source rejects the query.
    async fn open_cursor<'a>(&'a mut self, query: &'a str) -> Result<Box<dyn RowCursor + 'a>>;

    /// Releases every connection held by this source.
    async fn close(&mut self);

    /// Returns the source type this adapter handles
    fn source_type(&self) -> SourceType;
}

/// Opens sessions for connection descriptors.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// Opens a session for `descriptor`.
    ///
    /// # Errors
    /// Returns error if the descriptor is malformed or no compiled-in adapter
    /// handles it.
    async fn open(&self, descriptor: &str) -> Result<Box<dyn DataSource>>;
}

/// Detects the source type from a connection descriptor.
///
/// # Errors
/// Returns a configuration error for descriptors no adapter understands.
pub fn detect_source_type(descriptor: &str) -> Result<SourceType> {
    let trimmed = descriptor.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        return Ok(SourceType::PostgreSQL);
    }

    if lower.starts_with("sqlite:")
        || lower.ends_with(".db")
        || lower.ends_with(".sqlite")
        || lower.ends_with(".sqlite3")
    {
        return Ok(SourceType::SQLite);
    }

    if lower.starts_with("mssql://") || lower.starts_with("sqlserver://") || is_ado_string(&lower) {
        return Ok(SourceType::SqlServer);
    }

    Err(ExportError::configuration(format!(
        "Unrecognized connection descriptor: {}",
        redact_connection_string(descriptor)
    )))
}

/// ADO.NET-style `Server=...;Database=...` descriptors, as SQL Server uses.
fn is_ado_string(lower: &str) -> bool {
    lower.split(';').any(|pair| {
        pair.split_once('=').is_some_and(|(key, _)| {
            matches!(
                key.trim(),
                "server" | "data source" | "address" | "addr" | "network address"
            )
        })
    })
}

/// Factory dispatching on the descriptor to the compiled-in adapters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSourceFactory;

#[async_trait]
impl SourceFactory for DefaultSourceFactory {
    async fn open(&self, descriptor: &str) -> Result<Box<dyn DataSource>> {
        create_source(descriptor)
    }
}

/// Creates a data source for a connection descriptor.
///
/// # Example
/// ```rust,no_run
/// use dbexport_core::adapters::create_source;
///
/// # async fn example() -> dbexport_core::Result<()> {
/// let mut source = create_source("sqlite:///var/data/audit.db")?;
/// let mut cursor = source.open_cursor("SELECT * FROM people").await?;
/// println!("columns: {}", cursor.columns().join(","));
/// while let Some(row) = cursor.next_row().await? {
///     println!("{} cells", row.len());
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns error if the descriptor is invalid or its adapter is not compiled
/// in.
pub fn create_source(descriptor: &str) -> Result<Box<dyn DataSource>> {
    match detect_source_type(descriptor)? {
        #[cfg(feature = "postgresql")]
        SourceType::PostgreSQL => Ok(Box::new(postgres::PostgresSource::new(descriptor)?)),
        #[cfg(not(feature = "postgresql"))]
        SourceType::PostgreSQL => Err(ExportError::unsupported_feature(
            "Export",
            "PostgreSQL (rebuild with --features postgresql)",
        )),
        #[cfg(feature = "sqlite")]
        SourceType::SQLite => Ok(Box::new(sqlite::SqliteSource::new(descriptor)?)),
        #[cfg(not(feature = "sqlite"))]
        SourceType::SQLite => Err(ExportError::unsupported_feature(
            "Export",
            "SQLite (rebuild with --features sqlite)",
        )),
        #[cfg(feature = "mssql")]
        SourceType::SqlServer => Ok(Box::new(mssql::SqlServerSource::new(descriptor)?)),
        #[cfg(not(feature = "mssql"))]
        SourceType::SqlServer => Err(ExportError::unsupported_feature(
            "Export",
            "SQL Server (rebuild with --features mssql)",
        )),
    }
}
