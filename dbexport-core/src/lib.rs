//! Core library for dbexport.
//!
//! Exports tables from one or more databases into delimited text files,
//! decrypting column values along the way. Which columns are encrypted is
//! not configured: the first data row of each table decides it.
//!
//! # Security Guarantees
//! - Source databases are only queried, never written
//! - Credentials and key material are never logged; connection descriptors
//!   are redacted in reports and errors
//! - Cell values are never logged at any level
//! - Decryption only: nothing in this crate encrypts data
//!
//! # Architecture
//! - `adapters`: data-source traits and the SQLite/PostgreSQL/SQL Server
//!   implementations behind a factory
//! - `security`: decrypt capabilities and the password stores behind them
//! - `engine`: classification, streaming export and job orchestration
//! - `config`, `models`: the job file going in and the reports coming out

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod query;
pub mod security;

// Re-export commonly used types
pub use adapters::{DataSource, DefaultSourceFactory, RowCursor, SourceFactory, SourceType};
pub use config::{DatabaseConfig, ExportJobConfig, TableConfig};
pub use engine::{ColumnClassification, classify, export_database, export_job, export_rows, export_table};
pub use error::{ExportError, Result};
pub use models::{CellError, DatabaseReport, ExportOutcome, ExportStatus, JobReport, TableReport};
pub use query::resolve_query;
pub use security::{CapabilityProvider, DecryptError, Decryptor, PrefixDecryptor};
