// src/pipeline/mod.rs
//
// Fan-out executor: every listed item runs Fetch -> Normalize -> Load on its
// own, pulled from a shared queue by a bounded pool of workers.

use std::sync::Arc;
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver},
        Mutex,
    },
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{
    dispatcher, error, info, info_span, instrument::WithSubscriber, warn, Instrument, Span,
};

use crate::fetch::{Fetcher, WorkItem};
use crate::load::{load, LoadResult, Sink};
use crate::process::normalize;

pub mod summary;

pub use summary::{BranchOutcome, RunSummary};

struct Stages<S> {
    fetcher: Fetcher,
    sink: S,
}

impl<S: Sink> Stages<S> {
    async fn process(&self, url: &str) -> BranchOutcome {
        let payload = match self.fetcher.fetch(url).await {
            Ok(payload) => payload,
            Err(e) => return BranchOutcome::Failed(e.to_string()),
        };

        // parsing is CPU work; keep it off the async workers
        let span = Span::current();
        let dispatch = dispatcher::get_default(|d| d.clone());
        let table = match tokio::task::spawn_blocking(move || {
            dispatcher::with_default(&dispatch, || span.in_scope(|| normalize(payload)))
        })
        .await
        {
            Ok(table) => table,
            Err(e) => return BranchOutcome::Failed(format!("normalize task failed: {}", e)),
        };

        match load(&self.sink, table).await {
            Ok(LoadResult::Loaded { rows }) => BranchOutcome::Loaded { rows },
            Ok(LoadResult::Skipped(reason)) => BranchOutcome::Skipped(reason),
            Err(e) => BranchOutcome::Failed(e.to_string()),
        }
    }
}

pub struct Pipeline<S> {
    stages: Arc<Stages<S>>,
    max_concurrency: usize,
}

impl<S: Sink + 'static> Pipeline<S> {
    pub fn new(fetcher: Fetcher, sink: S, max_concurrency: usize) -> Self {
        Pipeline {
            stages: Arc::new(Stages { fetcher, sink }),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn sink(&self) -> &S {
        &self.stages.sink
    }

    /// Process every item, at most `max_concurrency` at a time.
    ///
    /// A failing item never stops its siblings. Once `cancel` fires, workers
    /// stop taking items and in-flight branches are aborted.
    pub async fn run(&self, items: Vec<WorkItem>, cancel: CancellationToken) -> RunSummary {
        let mut summary = RunSummary::new(items.len());
        if items.is_empty() {
            info!("no work items, nothing to do");
            return summary;
        }

        let workers = self.max_concurrency.min(items.len());
        let (tx, rx) = mpsc::unbounded_channel::<WorkItem>();
        for item in items {
            if tx.send(item).is_err() {
                break;
            }
        }
        // closing the queue lets workers exit once it drains
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));

        info!(items = summary.listed, workers, "fanning out");
        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            pool.spawn(
                worker(
                    worker_id,
                    Arc::clone(&queue),
                    Arc::clone(&self.stages),
                    cancel.clone(),
                )
                .with_current_subscriber(),
            );
        }

        while let Some(res) = pool.join_next().await {
            match res {
                Ok(outcomes) => outcomes.iter().for_each(|o| summary.record(o)),
                Err(e) => error!(error = %e, "worker task failed"),
            }
        }

        // items still queued were never started
        let mut rx = queue.lock().await;
        while rx.try_recv().is_ok() {
            summary.record(&BranchOutcome::Cancelled);
        }

        info!(
            listed = summary.listed,
            completed = summary.completed(),
            loaded = summary.loaded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            rows = summary.rows_appended,
            "run finished"
        );
        summary
    }
}

async fn worker<S: Sink + 'static>(
    worker_id: usize,
    queue: Arc<Mutex<UnboundedReceiver<WorkItem>>>,
    stages: Arc<Stages<S>>,
    cancel: CancellationToken,
) -> Vec<BranchOutcome> {
    let mut outcomes = Vec::new();
    while !cancel.is_cancelled() {
        let next = queue.lock().await.recv().await;
        let Some(item) = next else { break };

        let span = info_span!("item", item = item.index, url = %item.url, worker = worker_id);
        let outcome = run_branch(&stages, item, &cancel).instrument(span).await;
        outcomes.push(outcome);
    }
    outcomes
}

/// Runs one branch as its own task so a panic stays inside that item.
async fn run_branch<S: Sink + 'static>(
    stages: &Arc<Stages<S>>,
    item: WorkItem,
    cancel: &CancellationToken,
) -> BranchOutcome {
    let stages = Arc::clone(stages);
    let mut branch = tokio::spawn(
        async move { stages.process(&item.url).await }
            .in_current_span()
            .with_current_subscriber(),
    );

    let outcome = tokio::select! {
        res = &mut branch => match res {
            Ok(outcome) => outcome,
            Err(e) => BranchOutcome::Failed(format!("branch task failed: {}", e)),
        },
        _ = cancel.cancelled() => {
            branch.abort();
            BranchOutcome::Cancelled
        }
    };

    match &outcome {
        BranchOutcome::Loaded { rows } => info!(rows, "loaded"),
        BranchOutcome::Skipped(reason) => info!(%reason, "skipped"),
        BranchOutcome::Failed(err) => error!(error = %err, "failed"),
        BranchOutcome::Cancelled => warn!("cancelled"),
    }
    outcome
}
