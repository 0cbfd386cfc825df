use arrow::{
    array::{Array, Float64Array, StringArray, TimestampMicrosecondArray},
    record_batch::RecordBatch,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::ops::Range;
use tracing::{debug, instrument};

use super::Sink;
use crate::config::Config;
use crate::error::LoadError;
use crate::process::schema::{ColumnKind, CANONICAL_COLUMNS};

pub const SCHEMA_NAME: &str = "raw";
pub const TABLE_NAME: &str = "covid_data";

/// 14 binds per row; stays far below the 65535 bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

/// Advisory lock taken around the `IF NOT EXISTS` DDL; concurrent
/// `CREATE SCHEMA IF NOT EXISTS` can otherwise fail on a unique violation.
const DDL_LOCK_KEY: i64 = 0x636f_7669_6400;

pub fn create_schema_sql() -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA_NAME)
}

pub fn create_table_sql() -> String {
    let cols = CANONICAL_COLUMNS
        .iter()
        .map(|c| format!("{} {}", c.name, c.kind.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} ({})",
        SCHEMA_NAME, TABLE_NAME, cols
    )
}

pub fn insert_prefix() -> String {
    let cols = CANONICAL_COLUMNS
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {}.{} ({}) ", SCHEMA_NAME, TABLE_NAME, cols)
}

/// Borrowed, already-downcast view of one canonical column.
enum ColumnValues<'a> {
    Text(&'a StringArray),
    Float(&'a Float64Array),
    Timestamp(&'a TimestampMicrosecondArray),
}

fn typed_columns(table: &RecordBatch) -> Result<Vec<ColumnValues<'_>>, LoadError> {
    CANONICAL_COLUMNS
        .iter()
        .map(|col| {
            let array = table.column_by_name(col.name).map(|a| a.as_any());
            let typed = match col.kind {
                ColumnKind::Text => array
                    .and_then(|a| a.downcast_ref::<StringArray>())
                    .map(ColumnValues::Text),
                ColumnKind::Float => array
                    .and_then(|a| a.downcast_ref::<Float64Array>())
                    .map(ColumnValues::Float),
                ColumnKind::Timestamp => array
                    .and_then(|a| a.downcast_ref::<TimestampMicrosecondArray>())
                    .map(ColumnValues::Timestamp),
            };
            typed.ok_or(LoadError::Column {
                column: col.name,
                expected: col.kind.sql_type(),
            })
        })
        .collect()
}

fn micros_to_naive(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn insert_builder<'a>(
    columns: &'a [ColumnValues<'a>],
    rows: Range<usize>,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(insert_prefix());
    qb.push_values(rows, |mut b, row| {
        for col in columns {
            match col {
                ColumnValues::Text(a) => {
                    b.push_bind(a.is_valid(row).then(|| a.value(row)));
                }
                ColumnValues::Float(a) => {
                    b.push_bind(a.is_valid(row).then(|| a.value(row)));
                }
                ColumnValues::Timestamp(a) => {
                    b.push_bind(
                        a.is_valid(row)
                            .then(|| a.value(row))
                            .and_then(micros_to_naive),
                    );
                }
            }
        }
    });
    qb
}

/// Appends into `raw.covid_data` through a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub fn new(pool: PgPool) -> Self {
        PostgresSink { pool }
    }

    /// Build the pool without connecting; a database outage then surfaces as
    /// a per-item load failure instead of aborting the run.
    pub fn connect_lazy(config: &Config) -> Result<Self, LoadError> {
        let pool = PgPoolOptions::new()
            .max_connections(u32::try_from(config.max_concurrency).unwrap_or(u32::MAX))
            .acquire_timeout(config.db_acquire_timeout)
            .connect_lazy(&config.database_url)?;
        Ok(Self::new(pool))
    }

    /// Idempotent: creates the `raw` schema and the destination table if absent.
    async fn ensure_destination(&self) -> Result<(), LoadError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(DDL_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_schema_sql()).execute(&mut *tx).await?;
        sqlx::query(&create_table_sql()).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Sink for PostgresSink {
    /// Plain INSERTs in one transaction: no key, no dedup, no upsert.
    #[instrument(level = "debug", skip_all, fields(rows = table.num_rows()))]
    async fn append(&self, table: &RecordBatch) -> Result<u64, LoadError> {
        self.ensure_destination().await?;
        let columns = typed_columns(table)?;

        let n = table.num_rows();
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for start in (0..n).step_by(INSERT_CHUNK_ROWS) {
            let end = (start + INSERT_CHUNK_ROWS).min(n);
            let mut qb = insert_builder(&columns, start..end);
            written += qb.build().execute(&mut *tx).await?.rows_affected();
            debug!(start, end, "inserted chunk");
        }
        tx.commit().await?;
        Ok(written)
    }
}
