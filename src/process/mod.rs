// src/process/mod.rs
use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Builder, StringBuilder, TimestampMicrosecondBuilder},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::outcome::{Outcome, SkipReason};

pub mod columns;
pub mod convert;
pub mod raw_table;
pub mod schema;

use columns::ColumnMap;
use convert::{coerce_float, coerce_timestamp};
use raw_table::RawTable;
use schema::{canonical_schema, is_canonical, CanonicalColumn, ColumnKind, CANONICAL_COLUMNS};

/// Turn one raw CSV payload into a canonical table, or the absent marker.
///
/// Never fails: empty input, parse errors, the recovered-only file variant,
/// and schema validation errors all come back as `Outcome::Absent`.
pub fn normalize(payload: Outcome<String>) -> Outcome<RecordBatch> {
    payload.and_then(|text| normalize_text(&text))
}

fn normalize_text(text: &str) -> Outcome<RecordBatch> {
    if text.trim().is_empty() {
        warn!("Raw CSV is empty, skipping validation and processing");
        return Outcome::Absent(SkipReason::EmptyPayload);
    }

    let raw = match RawTable::parse(text) {
        Ok(raw) => raw,
        Err(e) => {
            let msg = format!("{:#}", e);
            warn!(error = %msg, "CSV parsing failed");
            return Outcome::Absent(SkipReason::ParseFailed(msg));
        }
    };

    let columns = ColumnMap::from_headers(raw.headers.iter().map(String::as_str));
    if columns.is_recovered_only() {
        info!(rows = raw.rows.len(), "CSV contains only the 'recovered' column, skipping");
        return Outcome::Absent(SkipReason::RecoveredOnly);
    }

    let dropped: Vec<&str> = columns
        .names()
        .iter()
        .map(String::as_str)
        .filter(|n| !is_canonical(n))
        .collect();
    if !dropped.is_empty() {
        debug!(?dropped, "ignoring non-canonical columns");
    }

    match build_canonical_batch(&raw, &columns) {
        Ok(batch) => {
            debug!(rows = batch.num_rows(), "normalized");
            Outcome::Present(batch)
        }
        Err(e) => {
            let msg = format!("{:#}", e);
            warn!(error = %msg, "Validation and processing failed");
            Outcome::Absent(SkipReason::ValidationFailed(msg))
        }
    }
}

/// Assemble the 14 canonical columns; columns the file lacks are all-null.
fn build_canonical_batch(raw: &RawTable, columns: &ColumnMap) -> Result<RecordBatch> {
    let arrays: Vec<ArrayRef> = CANONICAL_COLUMNS
        .iter()
        .map(|col| build_column(raw, columns.get(col.name), col))
        .collect();

    RecordBatch::try_new(canonical_schema(), arrays)
        .context("table does not match the canonical schema")
}

fn build_column(raw: &RawTable, source: Option<usize>, col: &CanonicalColumn) -> ArrayRef {
    let n = raw.rows.len();
    let cell = |row: usize| source.and_then(|field| raw.cell(row, field));
    let mut rejected = 0usize;

    let array: ArrayRef = match col.kind {
        ColumnKind::Text => {
            let mut b = StringBuilder::with_capacity(n, n * 16);
            for row in 0..n {
                b.append_option(cell(row).map(str::trim).filter(|s| !s.is_empty()));
            }
            Arc::new(b.finish())
        }
        ColumnKind::Float => {
            let mut b = Float64Builder::with_capacity(n);
            for row in 0..n {
                let (v, ok) = cell(row).map_or((None, true), coerce_float);
                if !ok {
                    rejected += 1;
                }
                b.append_option(v);
            }
            Arc::new(b.finish())
        }
        ColumnKind::Timestamp => {
            let mut b = TimestampMicrosecondBuilder::with_capacity(n);
            for row in 0..n {
                let (v, ok) = cell(row).map_or((None, true), coerce_timestamp);
                if !ok {
                    rejected += 1;
                }
                b.append_option(v.map(|ts| ts.and_utc().timestamp_micros()));
            }
            Arc::new(b.finish())
        }
    };

    if rejected > 0 {
        debug!(column = col.name, rejected, "unconvertible values set to null");
    }
    array
}
