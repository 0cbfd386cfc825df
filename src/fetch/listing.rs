use crate::error::ListingError;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    Client,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// One entry of the GitHub contents API response.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    download_url: Option<String>,
}

/// A remote CSV to process. `index` is the position in the listing and is
/// only used to correlate log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub url: String,
}

/// Fetch the directory listing and keep the `.csv` download URLs, in
/// response order. Any failure here aborts the run.
#[instrument(level = "info", skip(client, api_token))]
pub async fn list_csv_urls(
    client: &Client,
    listing_url: &str,
    api_token: &str,
) -> Result<Vec<WorkItem>, ListingError> {
    let transport = |source: reqwest::Error| ListingError::Transport {
        url: listing_url.to_string(),
        source,
    };

    let resp = client
        .get(listing_url)
        .header(AUTHORIZATION, format!("token {}", api_token))
        .header(ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .map_err(transport)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ListingError::Status { status });
    }

    let body = resp.text().await.map_err(transport)?;
    let entries: Vec<ContentEntry> = serde_json::from_str(&body)?;
    debug!(entries = entries.len(), "listing fetched");

    let items = select_csv(entries);
    info!(count = items.len(), "found CSV files");
    Ok(items)
}

fn select_csv(entries: Vec<ContentEntry>) -> Vec<WorkItem> {
    entries
        .into_iter()
        .filter(|e| e.name.ends_with(".csv"))
        .filter_map(|e| e.download_url)
        .enumerate()
        .map(|(index, url)| WorkItem { index, url })
        .collect()
}
