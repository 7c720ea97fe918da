// SPDX-License-Identifier: MIT OR Apache-2.0
//! Worker counters for observability.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, lock-free counters updated by the adapters and consumer loops.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    fetched: AtomicU64,
    handled: AtomicU64,
    acked: AtomicU64,
    retried: AtomicU64,
    exceeded: AtomicU64,
    duplicates: AtomicU64,
    errors: AtomicU64,
    gc_hints: AtomicU64,
}

/// Point-in-time view of [`WorkerMetrics`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Polls that returned a message.
    pub fetched: u64,
    /// Handler invocations.
    pub handled: u64,
    /// Messages acknowledged.
    pub acked: u64,
    /// Messages rescheduled for retry.
    pub retried: u64,
    /// Messages terminally rejected after exhausting retries.
    pub exceeded: u64,
    /// Deliveries refused by the dedup gate.
    pub duplicates: u64,
    /// Errors routed to `on_error`.
    pub errors: u64,
    /// Memory-flush hints issued.
    pub gc_hints: u64,
}

impl WorkerMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a poll that returned a message.
    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handler invocation.
    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acknowledgement.
    pub fn record_acked(&self) {
        self.acked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retry scheduling.
    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal rejection.
    pub fn record_exceeded(&self) {
        self.exceeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a duplicate delivery dropped by the dedup gate.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error routed to `on_error`.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a memory-flush hint.
    pub fn record_gc_hint(&self) {
        self.gc_hints.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            exceeded: self.exceeded.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            gc_hints: self.gc_hints.load(Ordering::Relaxed),
        }
    }
}
