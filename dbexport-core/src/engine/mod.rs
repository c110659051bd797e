//! The export engine: classification, row streaming and job orchestration.
//!
//! # Module Structure
//! - `classifier`: first-row column classification
//! - `rows`: streaming export of one query result to one sink
//! - `coordinator`: per-table query resolution and output files
//! - `driver`: sequential multi-database job execution
//!
//! Work is strictly sequential: databases, then tables, then rows. Each
//! table owns its cursor and sink for the duration of its export.

mod classifier;
mod coordinator;
mod driver;
mod rows;

#[cfg(test)]
pub(crate) mod fake;

pub use classifier::{ColumnClassification, classify};
pub use coordinator::{export_database, export_table};
pub use driver::export_job;
pub use rows::export_rows;
