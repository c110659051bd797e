//! Helper utilities shared by the database adapters.
//!
//! Each driver streams its own row type; [`StreamCursor`] adapts any such
//! stream into a [`RowCursor`] given a per-driver cell renderer.

use super::{RowCursor, RowValues};
use crate::{Result, error::ExportError};
use async_trait::async_trait;
use base64::Engine;
use futures::{TryStreamExt, stream::BoxStream};

/// Result of rendering one cell.
///
/// The outer `None` means the driver value has no text rendering; the inner
/// `None` is SQL NULL.
pub(crate) type Rendered = Option<Option<String>>;

/// Renders binary cells as `base64:<payload>`.
pub(crate) fn render_bytes(bytes: &[u8]) -> String {
    format!(
        "base64:{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Cursor over a driver row stream.
pub(crate) struct StreamCursor<'a, R, E> {
    columns: Vec<String>,
    rows: BoxStream<'a, std::result::Result<R, E>>,
    render: fn(&R, usize) -> Rendered,
    map_error: fn(E) -> ExportError,
    warned: Vec<bool>,
}

impl<'a, R, E> StreamCursor<'a, R, E> {
    pub(crate) fn new(
        columns: Vec<String>,
        rows: BoxStream<'a, std::result::Result<R, E>>,
        render: fn(&R, usize) -> Rendered,
        map_error: fn(E) -> ExportError,
    ) -> Self {
        let warned = vec![false; columns.len()];
        Self {
            columns,
            rows,
            render,
            map_error,
            warned,
        }
    }

    fn render_row(&mut self, row: &R) -> RowValues {
        let mut values = Vec::with_capacity(self.columns.len());
        for index in 0..self.columns.len() {
            match (self.render)(row, index) {
                Some(value) => values.push(value),
                None => {
                    // Unrenderable values are exported as empty cells
                    if !self.warned[index] {
                        self.warned[index] = true;
                        tracing::warn!(
                            "Column '{}' has a type with no text rendering; exporting empty values",
                            self.columns[index]
                        );
                    }
                    values.push(None);
                }
            }
        }
        values
    }
}

#[async_trait]
impl<'a, R, E> RowCursor for StreamCursor<'a, R, E>
where
    R: Send + 'a,
    E: Send + 'a,
{
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<RowValues>> {
        let next = self.rows.try_next().await.map_err(self.map_error)?;
        Ok(next.map(|row| self.render_row(&row)))
    }
}

/// Maps a sqlx error to the export error taxonomy.
///
/// Transport and pool failures are connection errors; anything the server or
/// decoder reports about the query itself is a query error.
#[cfg(any(feature = "postgresql", feature = "sqlite"))]
pub(crate) fn map_sqlx_error(error: sqlx::Error) -> ExportError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            ExportError::connection_failed("Database connection failed", error)
        }
        other => ExportError::query_failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn render_number(row: &Vec<i64>, index: usize) -> Rendered {
        // Negative numbers stand in for values with no text rendering
        let value = row[index];
        (value >= 0).then(|| (value > 0).then(|| value.to_string()))
    }

    fn map_message(message: String) -> ExportError {
        ExportError::query_failed(message)
    }

    #[test]
    fn test_render_bytes() {
        assert_eq!(render_bytes(b"hi"), "base64:aGk=");
        assert_eq!(render_bytes(&[]), "base64:");
    }

    #[tokio::test]
    async fn test_stream_cursor_renders_rows() {
        let rows: Vec<std::result::Result<Vec<i64>, String>> =
            vec![Ok(vec![1, 0, -1]), Ok(vec![2, 3, -5])];
        let mut cursor = StreamCursor::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            Box::pin(stream::iter(rows)),
            render_number,
            map_message,
        );

        assert_eq!(cursor.columns(), ["a", "b", "c"]);
        assert_eq!(
            cursor.next_row().await.unwrap(),
            Some(vec![Some("1".to_string()), None, None])
        );
        assert_eq!(
            cursor.next_row().await.unwrap(),
            Some(vec![Some("2".to_string()), Some("3".to_string()), None])
        );
        assert_eq!(cursor.next_row().await.unwrap(), None);
        assert_eq!(cursor.warned, vec![false, false, true]);
    }

    #[tokio::test]
    async fn test_stream_cursor_maps_errors() {
        let rows: Vec<std::result::Result<Vec<i64>, String>> =
            vec![Ok(vec![1]), Err("connection reset".to_string())];
        let mut cursor = StreamCursor::new(
            vec!["a".to_string()],
            Box::pin(stream::iter(rows)),
            render_number,
            map_message,
        );

        assert!(cursor.next_row().await.unwrap().is_some());
        let error = cursor.next_row().await.unwrap_err();
        assert!(matches!(error, ExportError::QueryExecution { .. }));
        assert!(error.to_string().contains("connection reset"));
    }
}
