//! Configured executor
//!
//! [`Executor`] carries an [`ExecutorConfig`] so callers can tune the default
//! worker budgets once and reuse them. The free functions in this module's
//! parent use the stock configuration.

use std::future::Future;

use super::config::ExecutorConfig;
use super::for_each::run_indexed;
use crate::Result;

/// Executor with a tunable worker budget policy
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Create a new executor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor from a validated configuration
    pub fn from_config(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Set the pool size used for large batches without an explicit budget
    pub fn with_io_workers(mut self, workers: usize) -> Self {
        self.config.io_workers = workers.max(1);
        self
    }

    /// Set the budget used by [`Executor::for_each_cpu`]
    pub fn with_cpu_workers(mut self, workers: usize) -> Self {
        self.config.cpu_workers = workers.max(1);
        self
    }

    /// Set the task count under which an unspecified budget means one worker
    /// per task
    pub fn with_small_batch_threshold(mut self, threshold: usize) -> Self {
        self.config.small_batch_threshold = threshold.max(1);
        self
    }

    /// Current configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// See [`crate::exec::for_each`]; a zero `batch` resolves against this
    /// executor's configuration.
    pub async fn for_each<F, Fut, E>(
        &self,
        n: usize,
        batch: usize,
        op: F,
    ) -> std::result::Result<(), E>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        run_indexed(&self.config, n, batch, op).await
    }

    /// Execute `n` IO-bound tasks on up to `io_workers` workers
    pub async fn for_each_io<F, Fut, E>(&self, n: usize, op: F) -> std::result::Result<(), E>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        run_indexed(&self.config, n, 0, op).await
    }

    /// Execute `n` CPU-bound tasks on up to `cpu_workers` workers
    pub async fn for_each_cpu<F, Fut, E>(&self, n: usize, op: F) -> std::result::Result<(), E>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        run_indexed(&self.config, n, self.config.cpu_workers, op).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_executor_configuration() {
        let executor = Executor::new()
            .with_io_workers(0)
            .with_cpu_workers(3)
            .with_small_batch_threshold(10);

        assert_eq!(executor.config().io_workers, 1);
        assert_eq!(executor.config().cpu_workers, 3);
        assert_eq!(executor.config().small_batch_threshold, 10);
    }

    #[test]
    fn test_from_config_validates() {
        let config = ExecutorConfig {
            cpu_workers: 0,
            ..Default::default()
        };
        assert!(Executor::from_config(config).is_err());
        assert!(Executor::from_config(ExecutorConfig::default()).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_io_workers_bound_concurrency() {
        let executor = Executor::new()
            .with_io_workers(3)
            .with_small_batch_threshold(1);

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        let result: std::result::Result<(), ()> = executor
            .for_each_io(30, move |_| {
                let (active, peak) = (a.clone(), p.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
