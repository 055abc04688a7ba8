//! Fan-out of a small, fixed set of heterogeneous operations

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use super::config::Regime;
use super::join_workers;
use super::metrics::{self, CallRecorder, Entry};
use super::ordered::ErrorSlot;

/// A type-erased operation for [`call`]
pub type BoxedOp<E> = BoxFuture<'static, Result<(), E>>;

/// Run every operation concurrently, wait for all of them, and return the first
/// error in argument order.
///
/// Each operation gets its own worker; the last one runs on the calling task.
/// All operations run to completion even when some fail. A single operation is
/// awaited directly and its result returned verbatim.
///
/// Heterogeneous operations can be passed as boxed futures:
///
/// ```rust
/// use futures::FutureExt;
///
/// # async fn example() -> Result<(), String> {
/// fast::exec::call(vec![
///     async { Ok::<(), String>(()) }.boxed(),
///     async { tokio::task::yield_now().await; Ok::<(), String>(()) }.boxed(),
/// ])
/// .await
/// # }
/// ```
pub fn call<I, Fut, E>(ops: I) -> impl Future<Output = Result<(), E>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    // Collect eagerly so the returned future does not hold the iterator
    call_all(ops.into_iter().collect())
}

#[instrument(level = "debug", skip_all, fields(ops = ops.len()))]
async fn call_all<Fut, E>(mut ops: Vec<Fut>) -> Result<(), E>
where
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let last = match ops.pop() {
        Some(last) => last,
        None => return Ok(()),
    };
    if ops.is_empty() {
        return last.await;
    }

    let recorder = CallRecorder::start(Entry::Call, Regime::SingleWave);
    let errors = Arc::new(ErrorSlot::new());
    let last_index = ops.len();
    let mut workers = JoinSet::new();
    for (index, op) in ops.into_iter().enumerate() {
        let errors = Arc::clone(&errors);
        workers.spawn(async move {
            let outcome = op.await;
            metrics::record_task(outcome.is_ok());
            errors.report(index, outcome);
        });
    }

    // A panic on the calling task waits for the spawned operations too
    let panic = match AssertUnwindSafe(last).catch_unwind().await {
        Ok(outcome) => {
            metrics::record_task(outcome.is_ok());
            errors.report(last_index, outcome);
            None
        }
        Err(payload) => Some(payload),
    };

    join_workers(workers, panic).await;
    recorder.finish();

    if let Some(index) = errors.failed_index() {
        debug!(index, "Fan-out finished with failures");
    }
    errors.take()
}
