//! Observability metrics for the control plane.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `capstan_control_operations_total` | Counter | `operation`, `outcome` | Control operations by final outcome |
//! | `capstan_control_step_ack_wait_seconds` | Histogram | - | Step-cancel acknowledgement wait |
//! | `capstan_control_state_writes_total` | Counter | `state` | Control-plane state writes by target state |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use capstan_control::metrics::ControlMetrics;
//!
//! let metrics = ControlMetrics::new();
//! metrics.record_operation("unlock", "applied");
//! ```
//!
//! Metrics flow through the `metrics` crate facade; install whatever exporter
//! the deployment uses (Prometheus, statsd, none). Recording without an
//! installed recorder is a no-op.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Control operations by final outcome.
    pub const OPERATIONS_TOTAL: &str = "capstan_control_operations_total";
    /// Histogram: Step-cancel acknowledgement wait in seconds.
    pub const STEP_ACK_WAIT_SECONDS: &str = "capstan_control_step_ack_wait_seconds";
    /// Counter: Control-plane state writes by target state.
    pub const STATE_WRITES_TOTAL: &str = "capstan_control_state_writes_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Operation name (cancel, unlock, force_unlock, ...).
    pub const OPERATION: &str = "operation";
    /// Outcome label (applied, rejected, dispatch_failed).
    pub const OUTCOME: &str = "outcome";
    /// Target task state of a write.
    pub const STATE: &str = "state";
}

/// High-level interface for recording control-plane metrics.
///
/// Cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct ControlMetrics {
    _private: (),
}

impl ControlMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the final outcome of a control operation.
    ///
    /// Increments the `capstan_control_operations_total` counter.
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        counter!(
            names::OPERATIONS_TOTAL,
            labels::OPERATION => operation.to_string(),
            labels::OUTCOME => outcome.to_string(),
        )
        .increment(1);
    }

    /// Records how long a step-cancel waited for acknowledgement.
    ///
    /// Records the duration in the `capstan_control_step_ack_wait_seconds`
    /// histogram. Timed-out waits are recorded too; their duration is the
    /// configured bound.
    pub fn observe_ack_wait(&self, duration: Duration) {
        histogram!(names::STEP_ACK_WAIT_SECONDS).record(duration.as_secs_f64());
    }

    /// Records a state write performed by the control plane.
    ///
    /// Increments the `capstan_control_state_writes_total` counter.
    pub fn record_state_write(&self, target_state: &str) {
        counter!(
            names::STATE_WRITES_TOTAL,
            labels::STATE => target_state.to_string(),
        )
        .increment(1);
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
///
/// ## Example
///
/// ```rust,no_run
/// use capstan_control::metrics::{ControlMetrics, TimingGuard};
///
/// let metrics = ControlMetrics::new();
///
/// {
///     let _guard = TimingGuard::new(|duration| {
///         metrics.observe_ack_wait(duration);
///     });
///     // Wait for the acknowledgement...
/// } // Duration recorded automatically on drop
/// ```
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

/// Creates a timing guard for the step-cancel acknowledgement wait.
#[must_use]
pub fn time_ack_wait() -> TimingGuard<impl FnOnce(Duration)> {
    TimingGuard::new(|duration| {
        histogram!(names::STEP_ACK_WAIT_SECONDS).record(duration.as_secs_f64());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_metrics_can_record_operations() {
        let metrics = ControlMetrics::new();

        // These calls should not panic even without a metrics recorder installed
        metrics.record_operation("unlock", "applied");
        metrics.record_operation("cancel_step", "dispatch_failed");
    }

    #[test]
    fn control_metrics_can_observe_and_count_writes() {
        let metrics = ControlMetrics::new();

        metrics.observe_ack_wait(Duration::from_millis(120));
        metrics.record_state_write("stopped");
    }

    #[test]
    fn timing_guard_measures_duration() {
        let mut recorded_duration = None;

        {
            let _guard = TimingGuard::new(|d| {
                recorded_duration = Some(d);
            });
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(recorded_duration.is_some_and(|d| d >= Duration::from_millis(10)));
    }

    #[test]
    fn timing_guard_elapsed_works() {
        let guard = TimingGuard::new(|_| {});
        std::thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed() >= Duration::from_millis(5));
    }
}
