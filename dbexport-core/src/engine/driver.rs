//! Multi-database export driver.

use super::coordinator::export_database;
use crate::adapters::SourceFactory;
use crate::config::{DatabaseConfig, ExportJobConfig};
use crate::error::redact_connection_string;
use crate::models::{DatabaseReport, JobReport};
use crate::security::Decryptor;
use std::time::Instant;

/// Runs a whole export job, one database after another.
///
/// Each database gets its own session from `factory`, which is closed once
/// its tables are done. A database whose session cannot be opened is
/// recorded as failed and the job moves on to the next one.
///
/// # Example
/// ```rust,no_run
/// use dbexport_core::adapters::DefaultSourceFactory;
/// use dbexport_core::config::ExportJobConfig;
/// use dbexport_core::engine::export_job;
/// use dbexport_core::security::PrefixDecryptor;
///
/// # async fn example() -> dbexport_core::Result<()> {
/// let config = ExportJobConfig::load("export.json").await?;
/// let report = export_job(&config, &DefaultSourceFactory, &PrefixDecryptor::default()).await;
/// println!("{} rows written", report.rows_written());
/// # Ok(())
/// # }
/// ```
pub async fn export_job(
    config: &ExportJobConfig,
    factory: &dyn SourceFactory,
    decryptor: &dyn Decryptor,
) -> JobReport {
    let started_at = chrono::Utc::now();
    let timer = Instant::now();

    tracing::info!(
        "Starting export of {} tables from {} databases",
        config.table_count(),
        config.databases.len()
    );

    let mut databases = Vec::with_capacity(config.databases.len());
    for database in &config.databases {
        databases.push(run_database(database, factory, decryptor).await);
    }

    let report = JobReport {
        started_at,
        total_duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
        exporter_version: env!("CARGO_PKG_VERSION").to_string(),
        databases,
    };

    tracing::info!(
        "Export finished: {} rows written, {} tables failed ({} ms)",
        report.rows_written(),
        report.tables_failed(),
        report.total_duration_ms
    );

    report
}

async fn run_database(
    database: &DatabaseConfig,
    factory: &dyn SourceFactory,
    decryptor: &dyn Decryptor,
) -> DatabaseReport {
    let connection = redact_connection_string(&database.connection_descriptor);
    tracing::info!(
        "Exporting {} tables from {}",
        database.tables.len(),
        connection
    );

    let mut source = match factory.open(&database.connection_descriptor).await {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Cannot open session for {}: {}", connection, e);
            return DatabaseReport {
                connection,
                tables: Vec::new(),
                failure: Some(e.detailed()),
            };
        }
    };

    tracing::debug!("Opened {} session for {}", source.source_type(), connection);

    let tables = export_database(source.as_mut(), database, decryptor).await;
    source.close().await;

    DatabaseReport {
        connection,
        tables,
        failure: None,
    }
}
