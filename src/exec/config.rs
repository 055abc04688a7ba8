//! Executor configuration and worker budget normalization

use serde::{Deserialize, Serialize};

use crate::{FastError, Result};

/// Default worker pool for IO-bound batches
pub const DEFAULT_IO_WORKERS: usize = 64;

/// Below this task count an unspecified budget gives every task its own worker
pub const DEFAULT_SMALL_BATCH_THRESHOLD: usize = 96;

/// Worker budget policy shared by all executor entry points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Pool size used when no budget is given and the batch is large
    pub io_workers: usize,
    /// Task count under which an unspecified budget becomes one worker per task
    pub small_batch_threshold: usize,
    /// Budget used by the CPU-bound wrapper
    pub cpu_workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            io_workers: DEFAULT_IO_WORKERS,
            small_batch_threshold: DEFAULT_SMALL_BATCH_THRESHOLD,
            cpu_workers: num_cpus::get(),
        }
    }
}

impl ExecutorConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject budgets that cannot run anything
    pub fn validate(&self) -> Result<()> {
        if self.io_workers == 0 {
            return Err(FastError::Config("io_workers must be at least 1".to_string()));
        }
        if self.cpu_workers == 0 {
            return Err(FastError::Config("cpu_workers must be at least 1".to_string()));
        }
        if self.small_batch_threshold == 0 {
            return Err(FastError::Config(
                "small_batch_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the effective worker budget for `n` tasks.
    ///
    /// A zero `batch` means unspecified: `n` itself for small batches, the IO
    /// pool size otherwise.
    #[inline]
    pub fn normalize_batch(&self, n: usize, batch: usize) -> usize {
        if batch > 0 {
            batch
        } else if n < self.small_batch_threshold {
            n
        } else {
            self.io_workers
        }
    }
}

/// Execution regime chosen for one indexed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Sequential, stops at the first error
    Sequential,
    /// One worker per index, every index runs
    SingleWave,
    /// Fixed pool pulling indices from a channel, halts dispatch on error
    Streaming,
}

impl Regime {
    /// Pick the regime for `n` tasks under a raw (unnormalized) budget.
    /// Returns the regime and the normalized budget.
    pub fn select(config: &ExecutorConfig, n: usize, batch: usize) -> (Self, usize) {
        if n <= 1 || batch == 1 {
            return (Regime::Sequential, 1);
        }
        let batch = config.normalize_batch(n, batch);
        if n <= batch {
            (Regime::SingleWave, batch)
        } else {
            (Regime::Streaming, batch)
        }
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Sequential => "sequential",
            Regime::SingleWave => "single_wave",
            Regime::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
