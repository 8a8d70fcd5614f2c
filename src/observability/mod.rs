//! Observability infrastructure for the HTTP kernel.
//!
//! Provides lifecycle counters and a duration timer; log output goes through
//! `tracing` when the feature is enabled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Kernel metrics collector.
#[derive(Debug, Default)]
pub struct KernelMetrics {
    /// Main requests handled.
    pub requests_handled: AtomicU64,
    /// Sub-requests handled.
    pub sub_requests_handled: AtomicU64,
    /// Failures turned into a response by an exception listener.
    pub exceptions_recovered: AtomicU64,
    /// Failures returned to the caller.
    pub exceptions_propagated: AtomicU64,
    /// Controllers that produced no response.
    pub contract_violations: AtomicU64,
    /// Terminate passes.
    pub terminations: AtomicU64,
    /// Cumulative handling time in microseconds.
    pub handle_time_us: AtomicU64,
}

impl KernelMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished handling pass.
    pub fn record_handled(&self, main: bool, elapsed: Duration) {
        if main {
            self.requests_handled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.sub_requests_handled.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.handle_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    /// Records a recovered failure.
    pub fn record_recovered(&self) {
        self.exceptions_recovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failure returned to the caller.
    pub fn record_propagated(&self) {
        self.exceptions_propagated.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a controller contract violation.
    pub fn record_contract_violation(&self) {
        self.contract_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a terminate pass.
    pub fn record_termination(&self) {
        self.terminations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> KernelMetricsSnapshot {
        KernelMetricsSnapshot {
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            sub_requests_handled: self.sub_requests_handled.load(Ordering::Relaxed),
            exceptions_recovered: self.exceptions_recovered.load(Ordering::Relaxed),
            exceptions_propagated: self.exceptions_propagated.load(Ordering::Relaxed),
            contract_violations: self.contract_violations.load(Ordering::Relaxed),
            terminations: self.terminations.load(Ordering::Relaxed),
            handle_time_us: self.handle_time_us.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.requests_handled.store(0, Ordering::Relaxed);
        self.sub_requests_handled.store(0, Ordering::Relaxed);
        self.exceptions_recovered.store(0, Ordering::Relaxed);
        self.exceptions_propagated.store(0, Ordering::Relaxed);
        self.contract_violations.store(0, Ordering::Relaxed);
        self.terminations.store(0, Ordering::Relaxed);
        self.handle_time_us.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelMetricsSnapshot {
    /// Main requests handled.
    pub requests_handled: u64,
    /// Sub-requests handled.
    pub sub_requests_handled: u64,
    /// Failures turned into a response by an exception listener.
    pub exceptions_recovered: u64,
    /// Failures returned to the caller.
    pub exceptions_propagated: u64,
    /// Controllers that produced no response.
    pub contract_violations: u64,
    /// Terminate passes.
    pub terminations: u64,
    /// Cumulative handling time in microseconds.
    pub handle_time_us: u64,
}

impl KernelMetricsSnapshot {
    /// Returns the mean handling time over all passes.
    pub fn mean_handle_time(&self) -> Duration {
        let passes = self.requests_handled + self.sub_requests_handled;
        if passes == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.handle_time_us / passes)
        }
    }

    /// Returns the share of failures that a listener recovered.
    pub fn recovery_rate(&self) -> f64 {
        let total = self.exceptions_recovered + self.exceptions_propagated;
        if total == 0 {
            1.0
        } else {
            self.exceptions_recovered as f64 / total as f64
        }
    }
}

/// Timer for measuring operation duration.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Creates and starts a new timer.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stops the timer and returns the duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            timer = %self.name,
            duration_ms = elapsed.as_millis(),
            "Timer stopped"
        );

        elapsed
    }
}
