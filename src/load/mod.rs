use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::error::LoadError;
use crate::outcome::{Outcome, SkipReason};

pub mod postgres;

pub use postgres::PostgresSink;

/// Append-only destination for canonical tables.
///
/// Implementations must be safe to call from many items at once.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Append every row of `table`; returns the number of rows written.
    async fn append(&self, table: &RecordBatch) -> Result<u64, LoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Loaded { rows: u64 },
    Skipped(SkipReason),
}

/// Write one normalized table. Absent or empty tables are a no-op and never
/// reach the sink; a write failure is logged and returned.
#[instrument(level = "debug", skip_all)]
pub async fn load<S>(sink: &S, table: Outcome<RecordBatch>) -> Result<LoadResult, LoadError>
where
    S: Sink + ?Sized,
{
    let batch = match table {
        Outcome::Present(batch) => batch,
        Outcome::Absent(reason) => {
            info!(%reason, "No data to load");
            return Ok(LoadResult::Skipped(reason));
        }
    };
    if batch.num_rows() == 0 {
        info!("No data to load: table has no rows");
        return Ok(LoadResult::Skipped(SkipReason::EmptyTable));
    }

    match sink.append(&batch).await {
        Ok(rows) => {
            info!(rows, "Data loaded");
            Ok(LoadResult::Loaded { rows })
        }
        Err(e) => {
            error!(error = %e, "Failed to load data");
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory sink that records every append, optionally failing when a
    /// batch carries a given `combined_key`.
    #[derive(Default)]
    pub struct RecordingSink {
        pub appends: Mutex<Vec<RecordBatch>>,
        pub fail_on_key: Option<String>,
    }

    impl RecordingSink {
        pub fn failing_on(key: &str) -> Self {
            RecordingSink {
                fail_on_key: Some(key.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.appends.lock().unwrap().len()
        }

        pub fn rows(&self) -> usize {
            self.appends
                .lock()
                .unwrap()
                .iter()
                .map(RecordBatch::num_rows)
                .sum()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn append(&self, table: &RecordBatch) -> Result<u64, LoadError> {
            if let Some(key) = &self.fail_on_key {
                let keys = table
                    .column_by_name("combined_key")
                    .and_then(|c| {
                        c.as_any()
                            .downcast_ref::<arrow::array::StringArray>()
                            .cloned()
                    });
                if keys.is_some_and(|k| k.iter().flatten().any(|v| v == key.as_str())) {
                    return Err(LoadError::Database(sqlx::Error::PoolTimedOut));
                }
            }
            self.appends.lock().unwrap().push(table.clone());
            Ok(table.num_rows() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::process::normalize;

    fn table(csv: &str) -> Outcome<RecordBatch> {
        normalize(Outcome::Present(csv.to_string()))
    }

    #[tokio::test]
    async fn absent_table_never_reaches_the_sink() {
        let sink = RecordingSink::default();
        let res = load(&sink, Outcome::Absent(SkipReason::RecoveredOnly))
            .await
            .unwrap();
        assert_eq!(res, LoadResult::Skipped(SkipReason::RecoveredOnly));
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn empty_table_never_reaches_the_sink() {
        let sink = RecordingSink::default();
        let res = load(&sink, table("Confirmed\n")).await.unwrap();
        assert_eq!(res, LoadResult::Skipped(SkipReason::EmptyTable));
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn rows_are_appended() {
        let sink = RecordingSink::default();
        let res = load(&sink, table("Confirmed,Deaths\n1,0\n2,1\n"))
            .await
            .unwrap();
        assert_eq!(res, LoadResult::Loaded { rows: 2 });
        assert_eq!(sink.rows(), 2);
    }

    #[tokio::test]
    async fn write_errors_propagate() {
        let sink = RecordingSink::failing_on("boom");
        let err = load(&sink, table("Combined_Key,Confirmed\nboom,1\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Database(_)));
        assert_eq!(sink.calls(), 0);
    }
}
