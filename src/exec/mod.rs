//! Bounded concurrent execution
//!
//! This module provides the fan-out primitives: [`call`] for a handful of
//! heterogeneous operations, and [`for_each`] with its wrappers for `n`
//! indexed tasks over a bounded worker pool.

use std::any::Any;

use lazy_static::lazy_static;
use tokio::task::JoinSet;

pub mod call;
pub mod config;
pub mod executor;
pub mod for_each;
pub mod metrics;
pub mod ordered;

pub use call::{call, BoxedOp};
pub use config::{ExecutorConfig, Regime, DEFAULT_IO_WORKERS, DEFAULT_SMALL_BATCH_THRESHOLD};
pub use executor::Executor;
pub use for_each::{for_each, for_each_cpu, for_each_io};
pub use ordered::{ErrorSlot, OrderedError};

lazy_static! {
    static ref DEFAULT_CONFIG: ExecutorConfig = ExecutorConfig::default();
}

/// Payload of a caught panic, as handed to [`std::panic::resume_unwind`]
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Wait for every worker, then re-raise a panic on the calling task.
///
/// `panic` is a panic already caught by the caller (from an inline task or an
/// earlier join); it takes precedence over any raised by the remaining workers.
pub(crate) async fn join_workers(mut workers: JoinSet<()>, mut panic: Option<PanicPayload>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            if err.is_panic() && panic.is_none() {
                panic = Some(err.into_panic());
            }
        }
    }
    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }
}
