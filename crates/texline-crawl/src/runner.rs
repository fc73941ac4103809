//! Task runner: fan identifiers out to the per-paper task

use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use texline_core::{ProgressContext, WorkQueue, is_shutdown_requested};

use crate::summary::Summary;
use crate::task::{Crawler, PaperResult};

/// Process every identifier in `ids`.
///
/// `workers <= 1` runs in input order on the calling thread. More workers
/// pull from a shared queue on a rayon pool, in no particular order. After a
/// shutdown request nothing new is started.
pub fn run(crawler: &Crawler<'_>, ids: &[String], progress: &ProgressContext) -> Result<Summary> {
    let start = Instant::now();
    let workers = crawler.config().workers;
    log::info!(
        "Crawling {} paper(s) into {} with {} worker(s)",
        ids.len(),
        crawler.config().output_dir.display(),
        workers.max(1)
    );

    let overall = progress.overall_bar(ids.len());
    let results = if workers <= 1 {
        run_sequential(crawler, ids, progress, &overall)
    } else {
        run_pool(crawler, ids, workers, progress, &overall)?
    };
    overall.finish_and_clear();

    if is_shutdown_requested() {
        log::warn!(
            "Shutdown requested: {} of {} paper(s) not started",
            ids.len().saturating_sub(results.len()),
            ids.len()
        );
    }

    Ok(Summary::from_results(results, ids.len(), start.elapsed()))
}

fn run_sequential(
    crawler: &Crawler<'_>,
    ids: &[String],
    progress: &ProgressContext,
    overall: &ProgressBar,
) -> Vec<PaperResult> {
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        if is_shutdown_requested() {
            break;
        }
        results.push(process_one(crawler, id, progress, overall));
    }
    results
}

fn run_pool(
    crawler: &Crawler<'_>,
    ids: &[String],
    workers: usize,
    progress: &ProgressContext,
    overall: &ProgressBar,
) -> Result<Vec<PaperResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("texline-worker-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    let queue = WorkQueue::new(ids.iter().collect());
    let results: Mutex<Vec<PaperResult>> = Mutex::new(Vec::with_capacity(ids.len()));

    pool.install(|| {
        rayon::scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| {
                    while let Some(id) = queue.next() {
                        let result = process_one(crawler, id, progress, overall);
                        results.lock().expect("worker thread panicked").push(result);
                    }
                });
            }
        });
    });

    log::debug!("{} of {} paper(s) dispatched", queue.dispatched(), queue.total());
    Ok(results.into_inner().expect("worker thread panicked"))
}

fn process_one(
    crawler: &Crawler<'_>,
    id: &str,
    progress: &ProgressContext,
    overall: &ProgressBar,
) -> PaperResult {
    let pb = progress.paper_bar(id);
    let result = crawler.process_paper(id, &pb);
    pb.finish_and_clear();
    overall.inc(1);
    if !result.success {
        overall.set_message(format!("last failure: {id}"));
    }
    result
}
