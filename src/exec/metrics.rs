//! Metrics collection for executor calls
//!
//! Provides Prometheus-compatible counters for fan-out and indexed batch
//! calls: how often each regime runs, task outcomes, and dispatch halts.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;

use super::config::Regime;

lazy_static! {
    /// Counter for executor calls
    static ref CALLS: IntCounterVec = register_int_counter_vec!(
        "fast_exec_calls_total",
        "Total number of executor calls",
        &["entry", "regime"]
    ).unwrap();

    /// Counter for finished tasks
    static ref TASKS: IntCounterVec = register_int_counter_vec!(
        "fast_exec_tasks_total",
        "Total number of executed tasks",
        &["status"]
    ).unwrap();

    /// Counter for streaming dispatch loops stopped by an error
    static ref DISPATCH_HALTED: IntCounter = register_int_counter!(
        "fast_exec_dispatch_halted_total",
        "Total number of streaming dispatches halted by a task error"
    ).unwrap();

    /// Histogram for call duration
    static ref CALL_DURATION: HistogramVec = register_histogram_vec!(
        "fast_exec_call_duration_seconds",
        "Executor call duration in seconds",
        &["regime"],
        vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();
}

/// Entry point that started a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// [`crate::exec::call`]
    Call,
    /// [`crate::exec::for_each`] and its wrappers
    ForEach,
}

impl Entry {
    fn as_str(&self) -> &'static str {
        match self {
            Entry::Call => "call",
            Entry::ForEach => "for_each",
        }
    }
}

/// Per-call recorder; records the call on creation and its duration on finish
pub struct CallRecorder {
    regime: Regime,
    start: Instant,
}

impl CallRecorder {
    /// Count a call and start its timer
    pub fn start(entry: Entry, regime: Regime) -> Self {
        CALLS
            .with_label_values(&[entry.as_str(), regime.as_str()])
            .inc();
        Self {
            regime,
            start: Instant::now(),
        }
    }

    /// Record completion and the call duration
    pub fn finish(self) {
        CALL_DURATION
            .with_label_values(&[self.regime.as_str()])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

/// Record a finished task
#[inline]
pub fn record_task(ok: bool) {
    TASKS
        .with_label_values(&[if ok { "ok" } else { "failed" }])
        .inc();
}

/// Record a streaming dispatch stopped by a task error
pub fn record_dispatch_halted() {
    DISPATCH_HALTED.inc();
}

/// Export metrics in Prometheus format
pub fn export_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer)
        .map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e).into())
}
