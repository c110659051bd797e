//! Export job configuration.
//!
//! The job file is JSON:
//!
//! ```json
//! {
//!   "databases": [
//!     {
//!       "connectionString": "sqlite:///var/data/audit.db",
//!       "query": "SELECT * FROM people",
//!       "tables": [
//!         { "tableName": "people", "outputFile": "out/people.csv" },
//!         { "tableName": "orders", "outputFile": "out/orders.csv", "query": "SELECT id, ssn FROM orders" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Missing or `null` `databases` and `tables` lists are treated as empty. The loaded
//! configuration is immutable; the driver only ever borrows it.

use crate::{Result, error::ExportError};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Ordered list of databases to export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobConfig {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub databases: Vec<DatabaseConfig>,
}

/// One source database and the tables to export from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Opaque descriptor identifying the source (URL or ADO-style string)
    #[serde(rename = "connectionString")]
    pub connection_descriptor: String,

    /// Query applied to every table that has no override of its own
    #[serde(default, rename = "query")]
    pub default_query: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub tables: Vec<TableConfig>,
}

/// One table export: where the rows come from and where they go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub table_name: String,

    #[serde(rename = "outputFile")]
    pub output_path: String,

    #[serde(default, rename = "query")]
    pub query_override: Option<String>,
}

/// Reads an explicit `null` list the same as a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Prefixes a validation message with the entry it came from.
fn locate(error: ExportError, location: String) -> ExportError {
    match error {
        ExportError::Configuration { message } => {
            ExportError::configuration(format!("{}: {}", location, message))
        }
        other => other,
    }
}

impl ExportJobConfig {
    /// Parses and validates a job configuration from JSON text.
    ///
    /// # Errors
    /// Returns a configuration error if the JSON is malformed or a required
    /// field is empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            ExportError::configuration(format!("Invalid export configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a job configuration file.
    ///
    /// # Errors
    /// Returns a configuration error if the file is missing, unreadable or
    /// structurally invalid.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            ExportError::configuration(format!(
                "Cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Validates every database and table entry.
    ///
    /// # Errors
    /// Returns error naming the first offending entry.
    pub fn validate(&self) -> Result<()> {
        for (db_index, database) in self.databases.iter().enumerate() {
            database
                .validate()
                .map_err(|e| locate(e, format!("databases[{}]", db_index)))?;
        }
        Ok(())
    }

    /// Total number of configured tables across all databases.
    pub fn table_count(&self) -> usize {
        self.databases.iter().map(|db| db.tables.len()).sum()
    }
}

impl DatabaseConfig {
    /// Validates the descriptor and each table entry.
    ///
    /// # Errors
    /// Returns a configuration error describing the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.connection_descriptor.trim().is_empty() {
            return Err(ExportError::configuration(
                "connectionString cannot be empty",
            ));
        }

        for (table_index, table) in self.tables.iter().enumerate() {
            table
                .validate()
                .map_err(|e| locate(e, format!("tables[{}]", table_index)))?;
        }

        Ok(())
    }
}

impl TableConfig {
    /// Creates a table entry without a query override.
    pub fn new(table_name: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            output_path: output_path.into(),
            query_override: None,
        }
    }

    /// Builder method to set the query override.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query_override = Some(query.into());
        self
    }

    /// Validates that the required fields are present.
    ///
    /// # Errors
    /// Returns a configuration error if `tableName` or `outputFile` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(ExportError::configuration("tableName cannot be empty"));
        }
        if self.output_path.trim().is_empty() {
            return Err(ExportError::configuration(format!(
                "outputFile cannot be empty for table '{}'",
                self.table_name
            )));
        }
        Ok(())
    }
}
