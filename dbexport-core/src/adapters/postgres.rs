//! PostgreSQL data source.
//!
//! Sessions use a single-connection pool created with `connect_lazy`, so
//! an unreachable server surfaces as a connection error on the first query
//! instead of when the session is opened.

use super::helpers::{Rendered, StreamCursor, map_sqlx_error, render_bytes};
use super::{DataSource, RowCursor, SourceType};
use crate::{Result, error::ExportError};
use async_trait::async_trait;
use sqlx::postgres::types::{PgInterval, PgMoney};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{BigDecimal, JsonValue};
use sqlx::{Column, Executor, Row};
use std::time::Duration;

/// Fractional digits of the `money` type under the default `lc_monetary`.
const MONEY_FRAC_DIGITS: i64 = 2;

/// Time allowed to establish the connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL session
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    /// Creates a lazily-connecting source for `descriptor`.
    ///
    /// # Errors
    /// Returns a configuration error if the URL cannot be parsed. The error
    /// message never contains the descriptor.
    pub fn new(descriptor: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(descriptor)
            .map_err(|e| {
                tracing::debug!("PostgreSQL descriptor rejected: {}", e);
                ExportError::configuration("Invalid PostgreSQL connection URL")
            })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DataSource for PostgresSource {
    async fn open_cursor<'a>(&'a mut self, query: &'a str) -> Result<Box<dyn RowCursor + 'a>> {
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
        SourceType::PostgreSQL
    }
}

/// Renders a PostgreSQL cell as text.
fn render_cell(row: &PgRow, index: usize) -> Rendered {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Some(v);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(index) {
        return Some(v.map(|n| n.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<PgMoney>, _>(index) {
        return Some(v.map(|m| m.to_bigdecimal(MONEY_FRAC_DIGITS).to_string()));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Some(v.map(|b| b.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(index) {
        return Some(v.map(|u| u.hyphenated().to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return Some(v.map(|t| t.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return Some(v.map(|t| t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return Some(v.map(|d| d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(index) {
        return Some(v.map(|t| t.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<PgInterval>, _>(index) {
        return Some(v.as_ref().map(render_interval));
    }
    if let Ok(v) = row.try_get::<Option<IpNetwork>, _>(index) {
        return Some(v.map(render_network));
    }
    if let Ok(v) = row.try_get::<Option<JsonValue>, _>(index) {
        return Some(v.map(|json| json.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Some(v.map(|bytes| render_bytes(&bytes)));
    }

    None
}

/// Renders an interval the way PostgreSQL's default `postgres` style does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn render_interval(interval: &PgInterval) -> String {
    fn unit(count: i64, singular: &str, plural: &str) -> String {
        format!("{} {}", count, if count.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day", "days"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let seconds = total / 1_000_000;
        let fraction = total % 1_000_000;

        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        if fraction != 0 {
            let digits = format!("{:06}", fraction);
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Renders `inet`/`cidr` values; single hosts drop the prefix length like
/// PostgreSQL does for `inet`.
fn render_network(network: IpNetwork) -> String {
    match network {
        IpNetwork::V4(v4) if v4.prefix() == 32 => v4.ip().to_string(),
        IpNetwork::V6(v6) if v6.prefix() == 128 => v6.ip().to_string(),
        other => other.to_string(),
    }
}
