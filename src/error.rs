//! Error types for the pipeline stages.
//!
//! Only the failures that end a unit of work live here. Recoverable
//! conditions (retries exhausted, unparseable files, degenerate files) are
//! carried as [`crate::Outcome::Absent`] instead.

use thiserror::Error;

/// Raised while building [`crate::Config`] from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Fatal to the whole run: without a file list there is nothing to fan out over.
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("listing request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("failed to fetch file list: {status}")]
    Status { status: reqwest::StatusCode },

    #[error("listing response is not a file array: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Connection-level failure while fetching one file. Fails that item only.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GET {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },
}

/// Write failure at the sink. Fails that item only.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("column {column} missing or not {expected}")]
    Column {
        column: &'static str,
        expected: &'static str,
    },
}
