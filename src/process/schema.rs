use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use once_cell::sync::Lazy;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Float,
    Timestamp,
}

impl ColumnKind {
    pub fn arrow_type(self) -> DataType {
        match self {
            ColumnKind::Text => DataType::Utf8,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Float => "DOUBLE PRECISION",
            ColumnKind::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CanonicalColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> CanonicalColumn {
    CanonicalColumn { name, kind }
}

/// The fixed 14-column shape every normalized table exposes, in sink order.
pub const CANONICAL_COLUMNS: [CanonicalColumn; 14] = [
    col("fips", ColumnKind::Float),
    col("admin2", ColumnKind::Text),
    col("province_state", ColumnKind::Text),
    col("country_region", ColumnKind::Text),
    col("last_update", ColumnKind::Timestamp),
    col("lat", ColumnKind::Float),
    col("long_", ColumnKind::Float),
    col("confirmed", ColumnKind::Float),
    col("deaths", ColumnKind::Float),
    col("recovered", ColumnKind::Float),
    col("active", ColumnKind::Float),
    col("combined_key", ColumnKind::Text),
    col("incident_rate", ColumnKind::Float),
    col("case_fatality_ratio", ColumnKind::Float),
];

// every column is nullable
static CANONICAL_SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(
        CANONICAL_COLUMNS
            .iter()
            .map(|c| Field::new(c.name, c.kind.arrow_type(), true))
            .collect::<Vec<_>>(),
    ))
});

pub fn canonical_schema() -> SchemaRef {
    CANONICAL_SCHEMA.clone()
}

pub fn is_canonical(name: &str) -> bool {
    CANONICAL_COLUMNS.iter().any(|c| c.name == name)
}
