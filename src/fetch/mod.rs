// src/fetch/mod.rs

use crate::config::Config;
use reqwest::Client;

pub mod download;
pub mod listing;

pub use download::{FetchPolicy, Fetcher};
pub use listing::{list_csv_urls, WorkItem};

/// GitHub rejects API calls without a User-Agent.
pub const USER_AGENT: &str = concat!("covidscraper/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client; every request inherits the configured timeout.
pub fn build_client(config: &Config) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout)
        .build()
}
