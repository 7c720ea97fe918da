// SPDX-License-Identifier: MIT OR Apache-2.0
//! Memory-flush hint pacing.
//!
//! This runtime has no collector to trigger, so the hint itself is a
//! no-op; the pacing and the hint counter stay so operators can observe
//! the cadence the worker would flush at.

use relayq_broker::WorkerMetrics;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::trace;

/// Emits at most one flush hint per interval.
pub struct FlushPacer {
    interval: Duration,
    last: Mutex<Instant>,
}

impl FlushPacer {
    /// Create a pacer; the first hint fires once `interval` has elapsed.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(Instant::now()),
        }
    }

    /// Emit a flush hint if the interval has elapsed since the previous
    /// one. Returns whether a hint was emitted.
    pub fn flush(&self, metrics: &WorkerMetrics) -> bool {
        let mut last = self.last.lock().expect("pacer lock poisoned");
        let now = Instant::now();
        if now.duration_since(*last) < self.interval {
            return false;
        }
        *last = now;
        drop(last);
        metrics.record_gc_hint();
        trace!(target: "relayq.worker", "memory flush hint");
        true
    }

    /// The configured minimum interval between hints.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
