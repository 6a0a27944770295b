//! Turn-level metrics
//!
//! Emits counters and histograms through the `metrics` facade so any
//! exporter (the optional Prometheus exporter included) can pick them up.
//!
//! # Metrics
//!
//! - `taskora_turns_total`: Counter of turns started
//! - `taskora_turn_duration_seconds`: Histogram of turn latency
//! - `taskora_turn_rounds_used`: Histogram of provider rounds per turn
//! - `taskora_turn_completions_total`: Counter of turn outcomes by status
//! - `taskora_tool_executions_total`: Counter of tool runs by tool and outcome
//! - `taskora_provider_retries_total`: Counter of provider retries
//! - `taskora_active_turns`: Gauge of turns currently in flight

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::cell::Cell;
use std::time::Instant;

/// Metrics collection for a single turn
///
/// Uses interior mutability (Cell) so completion can be recorded through
/// an immutable reference inside the async handler.
#[derive(Debug)]
pub struct TurnMetrics {
    start: Instant,
    recorded: Cell<bool>,
}

impl TurnMetrics {
    /// Starts tracking a turn
    ///
    /// Increments the turn counter and the active-turns gauge.
    pub fn new() -> Self {
        increment_counter!("taskora_turns_total");
        increment_gauge!("taskora_active_turns", 1.0);
        Self {
            start: Instant::now(),
            recorded: Cell::new(false),
        }
    }

    /// Records the turn's terminal outcome
    ///
    /// # Arguments
    ///
    /// * `rounds` - Provider rounds consumed
    /// * `status` - "completed", "rounds_exhausted", "provider_failed", or "failed"
    pub fn record_completion(&self, rounds: usize, status: &str) {
        if self.recorded.get() {
            return;
        }
        self.recorded.set(true);

        histogram!(
            "taskora_turn_duration_seconds",
            self.start.elapsed().as_secs_f64()
        );
        histogram!("taskora_turn_rounds_used", rounds as f64);
        increment_counter!("taskora_turn_completions_total", "status" => status.to_string());
        decrement_gauge!("taskora_active_turns", 1.0);
    }
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TurnMetrics {
    fn drop(&mut self) {
        // A turn that never recorded an outcome still leaves the gauge
        // balanced (early return via `?`).
        if !self.recorded.get() {
            increment_counter!("taskora_turn_completions_total", "status" => "aborted".to_string());
            decrement_gauge!("taskora_active_turns", 1.0);
        }
    }
}

/// Record one tool execution
pub fn record_tool_execution(tool: &str, success: bool) {
    increment_counter!(
        "taskora_tool_executions_total",
        "tool" => tool.to_string(),
        "outcome" => if success { "ok" } else { "error" }.to_string()
    );
}

/// Record a provider retry
pub fn record_provider_retry() {
    increment_counter!("taskora_provider_retries_total");
}
