//! Fan-out example
//!
//! Fetches a batch of simulated shards on a bounded worker pool, then shows how
//! a failing shard stops the remaining dispatch and how the lowest failing
//! index is reported.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fast::clock;
use fast::exec::{self, Executor};
use fast::random::rand_id;
use futures::FutureExt;

#[derive(Debug)]
struct ShardError {
    shard: usize,
    reason: String,
}

impl std::fmt::Display for ShardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shard {} failed: {}", self.shard, self.reason)
    }
}

impl std::error::Error for ShardError {}

async fn fetch_shard(
    shard: usize,
    fetched: Arc<AtomicUsize>,
    broken: Option<usize>,
) -> Result<(), ShardError> {
    clock::sleep(Duration::from_millis(5 + (shard % 7) as u64)).await;
    if Some(shard) == broken {
        return Err(ShardError {
            shard,
            reason: "connection reset".to_string(),
        });
    }
    fetched.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fast::logging::init_logging("fast=debug");

    let run_id = rand_id(12);
    println!("Run {} started at {}", run_id, clock::time().format("%H:%M:%S%.3f"));

    // Healthy batch on the IO pool
    let fetched = Arc::new(AtomicUsize::new(0));
    let counter = fetched.clone();
    let start = Instant::now();
    exec::for_each_io(500, move |shard| fetch_shard(shard, counter.clone(), None)).await?;
    println!(
        "Fetched {} shards in {:?}",
        fetched.load(Ordering::Relaxed),
        start.elapsed()
    );

    // Broken shard on a small pool: dispatch halts shortly after shard 40
    let executor = Executor::new().with_io_workers(4).with_small_batch_threshold(16);
    let fetched = Arc::new(AtomicUsize::new(0));
    let counter = fetched.clone();
    let result = executor
        .for_each_io(500, move |shard| fetch_shard(shard, counter.clone(), Some(40)))
        .await;
    match result {
        Ok(()) => println!("Unexpected success"),
        Err(err) => println!(
            "{} ({} shards fetched before dispatch stopped)",
            err,
            fetched.load(Ordering::Relaxed)
        ),
    }

    // A handful of unrelated steps
    exec::call(vec![
        async {
            clock::sleep(Duration::from_millis(10)).await;
            println!("warmed cache");
            Ok::<(), ShardError>(())
        }
        .boxed(),
        async {
            println!("opened audit log");
            Ok::<(), ShardError>(())
        }
        .boxed(),
    ])
    .await?;

    println!("{}", exec::metrics::export_metrics()?);
    Ok(())
}
