use anyhow::{bail, Context, Result};
use covidscraper::{
    fetch::{self, Fetcher},
    load::PostgresSink,
    pipeline::Pipeline,
    Config,
};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,covidscraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let config = Config::from_env().context("loading configuration")?;
    info!(?config, "configured");

    // ─── 3) cancellation: Ctrl-C or run deadline ─────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }
    if let Some(deadline) = config.run_deadline {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            sleep(deadline).await;
            warn!(?deadline, "run deadline reached, cancelling");
            cancel.cancel();
        });
    }

    // ─── 4) list work items ──────────────────────────────────────────
    let start = Instant::now();
    let client = fetch::build_client(&config).context("building HTTP client")?;
    let items = tokio::select! {
        listed = fetch::list_csv_urls(&client, &config.listing_url, &config.api_token) => {
            listed.context("listing CSV files")?
        }
        _ = cancel.cancelled() => bail!("cancelled before listing completed"),
    };

    // ─── 5) fan out Fetch → Normalize → Load ─────────────────────────
    let sink = PostgresSink::connect_lazy(&config).context("configuring database pool")?;
    let fetcher = Fetcher::new(client, config.fetch.clone());
    let pipeline = Pipeline::new(fetcher, sink, config.max_concurrency);
    let summary = pipeline.run(items, cancel).await;

    info!(elapsed = ?start.elapsed(), ?summary, "all done");
    if summary.is_clean() {
        return Ok(());
    }
    if summary.cancelled > 0 {
        bail!("run cancelled with {} items unprocessed", summary.cancelled);
    }
    bail!("{} of {} items failed to load", summary.failed, summary.listed)
}
