//! Streaming row export.
//!
//! Rows are pulled from the cursor one at a time and written straight to a
//! buffered sink, so memory use does not depend on table size.
//!
//! # Output Format
//! - Header: column names joined by `,`
//! - One line per data row, values joined by `,`, NULL as the empty string
//! - Lines end with `\n`
//! - No quoting or escaping: values containing `,` or newlines are written
//!   as-is

use super::classifier::{ColumnClassification, classify};
use crate::adapters::{DataSource, RowCursor, RowValues};
use crate::error::ExportError;
use crate::models::{CellError, ExportOutcome};
use crate::security::Decryptor;
use crate::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Sink buffer size
const SINK_BUFFER_CAPACITY: usize = 64 * 1024;

/// Exports the result of `query` to `sink`, decrypting encrypted columns.
///
/// The first data row classifies the columns (see [`classify`]). On later
/// rows only flagged columns are decrypted; a failure there is recorded as a
/// [`CellError`] and the raw value is written instead.
///
/// Never returns an error: connection, query, fetch and sink failures end
/// the export with a `Failed` outcome that keeps the rows already written.
pub async fn export_rows<W>(
    source: &mut dyn DataSource,
    query: &str,
    sink: W,
    decryptor: &dyn Decryptor,
) -> ExportOutcome
where
    W: AsyncWrite + Unpin + Send,
{
    let mut cursor = match source.open_cursor(query).await {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!("Query could not be executed: {}", e);
            return ExportOutcome::failed(e.detailed());
        }
    };

    let mut writer = BufWriter::with_capacity(SINK_BUFFER_CAPACITY, sink);
    let mut outcome = ExportOutcome::new();

    match stream_rows(cursor.as_mut(), &mut writer, decryptor, &mut outcome).await {
        Ok(()) => outcome.finish(),
        Err(e) => {
            // Keep whatever the sink still accepts
            if let Err(flush_error) = writer.flush().await {
                tracing::debug!("Flush after failed export also failed: {}", flush_error);
            }
            tracing::warn!(
                "Export aborted after {} rows: {}",
                outcome.rows_written,
                e
            );
            outcome.fail(e.detailed())
        }
    }
}

async fn stream_rows<W>(
    cursor: &mut dyn RowCursor,
    writer: &mut BufWriter<W>,
    decryptor: &dyn Decryptor,
    outcome: &mut ExportOutcome,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let columns = cursor.columns().to_vec();
    write_line(writer, columns.iter().map(String::as_str))
        .await
        .map_err(|e| ExportError::sink_write("Failed to write header", e))?;

    let mut classification: Option<ColumnClassification> = None;

    while let Some(raw) = cursor.next_row().await? {
        let row_number = outcome.rows_written + 1;

        let values = if let Some(known) = classification.as_ref() {
            decrypt_row(raw, row_number, &columns, known, decryptor, outcome)
        } else {
            let (values, detected) = classify(raw, decryptor);
            tracing::debug!(
                "Detected {} encrypted of {} columns: {:?}",
                detected.decryptable_count(),
                columns.len(),
                detected.flags()
            );
            classification = Some(detected);
            values
        };

        write_line(writer, values.iter().map(|v| v.as_deref().unwrap_or("")))
            .await
            .map_err(|e| ExportError::sink_write(format!("Failed to write row {}", row_number), e))?;

        outcome.rows_written = row_number;
        tracing::trace!("Wrote row {}", row_number);
    }

    writer
        .flush()
        .await
        .map_err(|e| ExportError::sink_write("Failed to flush output", e))
}

/// Decrypts the flagged columns of a row after the detection row.
fn decrypt_row(
    raw: RowValues,
    row_number: u64,
    columns: &[String],
    classification: &ColumnClassification,
    decryptor: &dyn Decryptor,
    outcome: &mut ExportOutcome,
) -> RowValues {
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            if !classification.is_decryptable(index) {
                return value;
            }

            match decryptor.decrypt(value.as_deref()) {
                Ok(plaintext) => Some(plaintext),
                Err(e) => {
                    let error = CellError {
                        row_number,
                        column_index: index,
                        column_name: columns.get(index).cloned().unwrap_or_default(),
                        message: e.to_string(),
                    };
                    tracing::warn!("{}", error);
                    outcome.record_cell_error(error);
                    value
                }
            }
        })
        .collect()
}

async fn write_line<'v, W>(
    writer: &mut BufWriter<W>,
    values: impl Iterator<Item = &'v str>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut line = values.collect::<Vec<_>>().join(",");
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}
