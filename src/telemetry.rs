//! Process-wide counters for the notification pipeline
//!
//! These back the `status` reply on the control socket and are mirrored as
//! trace events so the log file carries the same numbers.

use serde::Serialize;

/// Pipeline metrics
pub mod metrics {
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Completed poll cycles (any outcome)
    static CYCLES: AtomicU64 = AtomicU64::new(0);

    /// Successful native deliveries
    static DELIVERED: AtomicU64 = AtomicU64::new(0);

    /// Native deliveries that failed
    static DELIVERY_FAILURES: AtomicU64 = AtomicU64::new(0);

    /// Cycles that got no data (transport, status, timeout, body)
    static FETCH_FAILURES: AtomicU64 = AtomicU64::new(0);

    /// Redirects handed to the navigator
    static REDIRECTS_OPENED: AtomicU64 = AtomicU64::new(0);

    pub fn record_cycle() {
        CYCLES.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(monotonic_counter.poll_cycles = 1, "poll cycle recorded");
    }

    pub fn record_delivery() {
        DELIVERED.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(monotonic_counter.delivered = 1, "delivery recorded");
    }

    pub fn record_delivery_failure() {
        DELIVERY_FAILURES.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure() {
        FETCH_FAILURES.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redirect_opened() {
        REDIRECTS_OPENED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_cycles() -> u64 {
        CYCLES.load(Ordering::Relaxed)
    }

    pub fn get_delivered() -> u64 {
        DELIVERED.load(Ordering::Relaxed)
    }

    pub fn get_delivery_failures() -> u64 {
        DELIVERY_FAILURES.load(Ordering::Relaxed)
    }

    pub fn get_fetch_failures() -> u64 {
        FETCH_FAILURES.load(Ordering::Relaxed)
    }

    pub fn get_redirects_opened() -> u64 {
        REDIRECTS_OPENED.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    pub fetch_failures: u64,
    pub redirects_opened: u64,
}

impl MetricsSnapshot {
    pub fn capture() -> Self {
        Self {
            cycles: metrics::get_cycles(),
            delivered: metrics::get_delivered(),
            delivery_failures: metrics::get_delivery_failures(),
            fetch_failures: metrics::get_fetch_failures(),
            redirects_opened: metrics::get_redirects_opened(),
        }
    }
}
