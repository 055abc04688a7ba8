//! # fast
//!
//! Bounded fan-out execution for async Rust, plus a few small utilities aimed
//! at hot paths.
//!
//! ## Overview
//!
//! The core runs a known number of independent tasks concurrently on Tokio and
//! reports at most one error: the one from the lowest task index, no matter
//! which task failed first. When the task count exceeds the worker budget,
//! indices not yet handed to a worker are never started once a failure is seen.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! # async fn example() -> Result<(), String> {
//! let done = Arc::new(AtomicUsize::new(0));
//! let counter = done.clone();
//!
//! // 1000 tasks on at most 8 workers
//! fast::exec::for_each(1000, 8, move |i| {
//!     let counter = counter.clone();
//!     async move {
//!         if i == usize::MAX {
//!             return Err(format!("task {} failed", i));
//!         }
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         Ok(())
//!     }
//! })
//! .await?;
//!
//! assert_eq!(done.load(Ordering::Relaxed), 1000);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`exec`]: fan-out call and indexed batch execution
//! - [`random`]: CSPRNG bytes, integers and identifiers
//! - [`clock`]: coarse cached clock and mockable sleep
//! - [`utils`]: object pooling
//! - [`logging`]: subscriber setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, FastError>;

/// Errors raised by this crate itself.
///
/// Task errors never use this type: executors return the caller's own error
/// value unchanged.
#[derive(Error, Debug)]
pub enum FastError {
    /// Invalid executor configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bounded concurrent execution
pub mod exec;

/// CSPRNG helpers
pub mod random;

/// Coarse clock
pub mod clock;

/// Utility functions and helpers
pub mod utils;

/// Logging setup
pub mod logging;

pub use exec::{call, for_each, for_each_cpu, for_each_io, Executor, ExecutorConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FastError::Config("io_workers must be at least 1".to_string());
        assert_eq!(err.to_string(), "Configuration error: io_workers must be at least 1");
    }

    #[tokio::test]
    async fn test_reexports() {
        let result: std::result::Result<(), ()> = for_each_io(3, |_| async { Ok(()) }).await;
        assert!(result.is_ok());
    }
}
