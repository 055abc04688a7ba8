//! Indexed batch execution
//!
//! Runs `n` homogeneous tasks indexed `0..n` on at most `batch` concurrent
//! workers. Three regimes, picked per call by [`Regime::select`]:
//!
//! - **Sequential** (`n <= 1` or `batch == 1`): in index order on the calling
//!   task, returning at the first error.
//! - **Single wave** (`n <= batch`): one worker per index. Every index runs,
//!   failures included, since all of them are claimed before any result is
//!   known.
//! - **Streaming** (`n > batch`): `batch` workers start on indices
//!   `0..batch`, then pull further indices from a shared channel. The
//!   dispatcher races each hand-off against the error channel and worker
//!   exits, and stops feeding indices as soon as a failure or a panic is
//!   observable.
//!
//! In every regime the returned error is the one from the lowest failing
//! index, returned unchanged.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, instrument, trace};

use super::config::{ExecutorConfig, Regime};
use super::metrics::{self, CallRecorder, Entry};
use super::ordered::{ErrorSlot, OrderedError};
use super::{join_workers, DEFAULT_CONFIG};

/// Execute `n` tasks using at most `batch` workers.
///
/// `op` is called once for each `i` in `0..n`. A `batch` of 0 picks `n`
/// workers for fewer than 96 tasks and 64 otherwise. If any call fails, indices
/// not yet handed to a worker are never started and the error associated with
/// the lowest `i` is returned.
pub async fn for_each<F, Fut, E>(n: usize, batch: usize, op: F) -> Result<(), E>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    run_indexed(&DEFAULT_CONFIG, n, batch, op).await
}

/// Execute `n` IO-bound tasks using up to 64 workers.
pub async fn for_each_io<F, Fut, E>(n: usize, op: F) -> Result<(), E>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    run_indexed(&DEFAULT_CONFIG, n, 0, op).await
}

/// Execute `n` CPU-bound tasks using up to one worker per CPU.
pub async fn for_each_cpu<F, Fut, E>(n: usize, op: F) -> Result<(), E>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    run_indexed(&DEFAULT_CONFIG, n, DEFAULT_CONFIG.cpu_workers, op).await
}

#[instrument(level = "debug", skip(config, op))]
pub(crate) async fn run_indexed<F, Fut, E>(
    config: &ExecutorConfig,
    n: usize,
    batch: usize,
    op: F,
) -> Result<(), E>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let (regime, batch) = Regime::select(config, n, batch);
    debug!(%regime, workers = batch, "Selected execution regime");

    let recorder = CallRecorder::start(Entry::ForEach, regime);
    let result = match regime {
        Regime::Sequential => run_sequential(n, &op).await,
        Regime::SingleWave => run_single_wave(n, Arc::new(op)).await,
        Regime::Streaming => run_streaming(n, batch, Arc::new(op)).await,
    };
    recorder.finish();
    result
}

/// Run one task and record its outcome
#[inline]
async fn run_task<F, Fut, E>(op: &F, index: usize) -> Result<(), E>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let outcome = op(index).await;
    metrics::record_task(outcome.is_ok());
    outcome
}

async fn run_sequential<F, Fut, E>(n: usize, op: &F) -> Result<(), E>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    for index in 0..n {
        if let Err(err) = run_task(op, index).await {
            debug!(index, "Task failed, skipping remaining indices");
            return Err(err);
        }
    }
    Ok(())
}

async fn run_single_wave<F, Fut, E>(n: usize, op: Arc<F>) -> Result<(), E>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let errors = Arc::new(ErrorSlot::new());
    let last = n - 1;

    let mut workers = JoinSet::new();
    for index in 0..last {
        let op = Arc::clone(&op);
        let errors = Arc::clone(&errors);
        workers.spawn(async move {
            let outcome = run_task(op.as_ref(), index).await;
            errors.report(index, outcome);
        });
    }

    // The calling task takes the last index itself
    let panic = match AssertUnwindSafe(run_task(op.as_ref(), last)).catch_unwind().await {
        Ok(outcome) => {
            errors.report(last, outcome);
            None
        }
        Err(payload) => Some(payload),
    };
    join_workers(workers, panic).await;

    if let Some(index) = errors.failed_index() {
        debug!(index, "Single wave finished with failures");
    }
    errors.take()
}

async fn run_streaming<F, Fut, E>(n: usize, batch: usize, op: Arc<F>) -> Result<(), E>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    // Capacity 1 is the smallest tokio allows; at most one index sits unclaimed
    let (index_tx, index_rx) = mpsc::channel::<usize>(1);
    let index_rx = Arc::new(Mutex::new(index_rx));
    // Each worker reports at most once, so reporting never blocks
    let (error_tx, mut error_rx) = mpsc::channel::<(usize, E)>(batch);

    let mut workers = JoinSet::new();
    for first in 0..batch {
        workers.spawn(stream_worker(
            first,
            Arc::clone(&op),
            Arc::clone(&index_rx),
            error_tx.clone(),
        ));
    }

    // Workers own the remaining ends: the error channel closes once all of
    // them exit, and sends fail if none is left to receive.
    drop(error_tx);
    drop(index_rx);

    let mut errors = OrderedError::new();
    let mut panic = None;
    let mut next = batch;
    while next < n {
        tokio::select! {
            biased;
            Some((index, err)) = error_rx.recv() => {
                debug!(index, dispatched = next, "Task failed, halting dispatch");
                metrics::record_dispatch_halted();
                errors.set(index, err);
                break;
            }
            // A worker that failed has already queued its error above
            Some(joined) = workers.join_next() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        debug!(dispatched = next, "Worker panicked, halting dispatch");
                        metrics::record_dispatch_halted();
                        panic = Some(err.into_panic());
                        break;
                    }
                }
            }
            sent = index_tx.send(next) => {
                if sent.is_err() {
                    break;
                }
                next += 1;
            }
        }
    }
    drop(index_tx);

    while let Some((index, err)) = error_rx.recv().await {
        errors.set(index, err);
    }
    join_workers(workers, panic).await;
    errors.into_result()
}

/// Run `first`, then keep pulling indices until the supply closes or a task
/// fails. A failure is reported once and ends the worker.
async fn stream_worker<F, Fut, E>(
    first: usize,
    op: Arc<F>,
    indices: Arc<Mutex<mpsc::Receiver<usize>>>,
    errors: mpsc::Sender<(usize, E)>,
) where
    F: Fn(usize) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Send,
{
    let mut next = Some(first);
    let mut executed = 0usize;
    while let Some(index) = next {
        if let Err(err) = run_task(op.as_ref(), index).await {
            // The dispatcher drains until every worker has exited
            let _ = errors.send((index, err)).await;
            trace!(first, executed, index, "Worker stopped on failure");
            return;
        }
        executed += 1;
        next = indices.lock().await.recv().await;
    }
    trace!(first, executed, "Worker finished");
}
