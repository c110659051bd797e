//! In-process data source for engine tests.

use crate::adapters::{DataSource, RowCursor, RowValues, SourceType};
use crate::{Result, error::ExportError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Scripted response for one query.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Column names and rows; an `Err` row fails the fetch with that message
    Rows(Vec<&'static str>, Vec<std::result::Result<RowValues, &'static str>>),
    /// The source cannot be reached
    Unreachable,
    /// The source rejects the query
    Rejected,
}

/// Source answering queries from scripts and recording what happened.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    scripts: HashMap<String, Script>,
    /// Queries in execution order
    pub(crate) executed: Vec<String>,
    /// Rows handed out across all cursors
    pub(crate) fetched: Arc<Mutex<usize>>,
    pub(crate) closed: bool,
}

impl FakeSource {
    pub(crate) fn with(mut self, query: &str, script: Script) -> Self {
        self.scripts.insert(query.to_string(), script);
        self
    }

    pub(crate) fn fetched(&self) -> usize {
        *self.fetched.lock().unwrap()
    }
}

pub(crate) fn row(values: &[Option<&str>]) -> RowValues {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

struct FakeCursor {
    columns: Vec<String>,
    rows: VecDeque<std::result::Result<RowValues, &'static str>>,
    fetched: Arc<Mutex<usize>>,
}

#[async_trait]
impl RowCursor for FakeCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<RowValues>> {
        match self.rows.pop_front() {
            Some(Ok(values)) => {
                *self.fetched.lock().unwrap() += 1;
                Ok(Some(values))
            }
            Some(Err(message)) => Err(ExportError::query_failed(message)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn open_cursor<'a>(&'a mut self, query: &'a str) -> Result<Box<dyn RowCursor + 'a>> {
        self.executed.push(query.to_string());
        match self.scripts.get(query).cloned() {
            Some(Script::Rows(columns, rows)) => Ok(Box::new(FakeCursor {
                columns: columns.into_iter().map(str::to_string).collect(),
                rows: rows.into(),
                fetched: Arc::clone(&self.fetched),
            })),
            Some(Script::Unreachable) => Err(ExportError::connection_failed(
                "Database connection failed",
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            )),
            Some(Script::Rejected) | None => Err(ExportError::query_failed(format!(
                "no such table in '{}'",
                query
            ))),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn source_type(&self) -> SourceType {
        SourceType::SQLite
    }
}
