// SPDX-License-Identifier: MIT OR Apache-2.0
//! Worker configuration options.

use relayq_core::WorkerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a worker run, immutable after `start`.
///
/// The adapter instance and broker client of the original option set are
/// typed constructor inputs (on the runtime builder and the adapter
/// builders respectively); everything else lives here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerOptions {
    /// Worker groups to fan out; `0` runs a single in-process group.
    pub fork_count: u32,

    /// Consumer loops per group; `0` runs one loop inline.
    pub thread_count: u32,

    /// Idle sleep, in seconds, after a poll that returned nothing.
    pub sleep_seconds: u64,

    /// Minimum interval, in seconds, between memory-flush hints.
    pub gc_flush_interval_seconds: u64,

    /// Long-poll wait, in seconds, handed to the broker on each fetch.
    pub queue_poll_wait_seconds: u64,

    /// Broker connection string (AMQP-style brokers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mq_endpoint: Option<String>,

    /// Whether AMQP queues and exchanges are declared durable.
    pub durable: bool,

    /// Whether `start` blocks until every worker group exits.
    pub wait: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            fork_count: 0,
            thread_count: 1,
            sleep_seconds: 0,
            gc_flush_interval_seconds: 10,
            queue_poll_wait_seconds: 15,
            mq_endpoint: None,
            durable: true,
            wait: true,
        }
    }
}

impl WorkerOptions {
    /// Options with every knob at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker-group fan-out count.
    #[must_use]
    pub fn with_fork_count(mut self, count: u32) -> Self {
        self.fork_count = count;
        self
    }

    /// Set the consumer loops per group.
    #[must_use]
    pub fn with_thread_count(mut self, count: u32) -> Self {
        self.thread_count = count;
        self
    }

    /// Set the idle sleep after empty polls.
    #[must_use]
    pub fn with_sleep_seconds(mut self, seconds: u64) -> Self {
        self.sleep_seconds = seconds;
        self
    }

    /// Set the minimum interval between memory-flush hints.
    #[must_use]
    pub fn with_gc_flush_interval_seconds(mut self, seconds: u64) -> Self {
        self.gc_flush_interval_seconds = seconds;
        self
    }

    /// Set the broker long-poll wait.
    #[must_use]
    pub fn with_queue_poll_wait_seconds(mut self, seconds: u64) -> Self {
        self.queue_poll_wait_seconds = seconds;
        self
    }

    /// Set the broker connection string.
    #[must_use]
    pub fn with_mq_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.mq_endpoint = Some(endpoint.into());
        self
    }

    /// Set queue/exchange durability.
    #[must_use]
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Set whether `start` blocks until the workers exit.
    #[must_use]
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Idle sleep as a [`Duration`].
    #[must_use]
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds)
    }

    /// Poll wait as a [`Duration`].
    #[must_use]
    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.queue_poll_wait_seconds)
    }

    /// Flush interval as a [`Duration`].
    #[must_use]
    pub fn gc_flush_interval(&self) -> Duration {
        Duration::from_secs(self.gc_flush_interval_seconds)
    }

    /// Validate option values that can be checked without an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] for malformed values, such as an
    /// endpoint that is present but blank.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if let Some(endpoint) = &self.mq_endpoint
            && endpoint.trim().is_empty()
        {
            return Err(WorkerError::config("mq_endpoint must not be blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let opts = WorkerOptions::default();
        assert_eq!(opts.fork_count, 0);
        assert_eq!(opts.thread_count, 1);
        assert_eq!(opts.sleep_seconds, 0);
        assert_eq!(opts.gc_flush_interval_seconds, 10);
        assert_eq!(opts.queue_poll_wait_seconds, 15);
        assert!(opts.mq_endpoint.is_none());
        assert!(opts.durable);
        assert!(opts.wait);
    }

    #[test]
    fn builder_round_trips_every_knob() {
        let opts = WorkerOptions::new()
            .with_fork_count(3)
            .with_thread_count(4)
            .with_sleep_seconds(1)
            .with_gc_flush_interval_seconds(30)
            .with_queue_poll_wait_seconds(2)
            .with_mq_endpoint("amqp://localhost:5672")
            .with_durable(false)
            .with_wait(false);
        assert_eq!(opts.fork_count, 3);
        assert_eq!(opts.thread_count, 4);
        assert_eq!(opts.sleep_seconds, 1);
        assert_eq!(opts.gc_flush_interval_seconds, 30);
        assert_eq!(opts.queue_poll_wait_seconds, 2);
        assert_eq!(opts.mq_endpoint.as_deref(), Some("amqp://localhost:5672"));
        assert!(!opts.durable);
        assert!(!opts.wait);
    }

    #[test]
    fn duration_views_convert_seconds() {
        let opts = WorkerOptions::new()
            .with_sleep_seconds(2)
            .with_queue_poll_wait_seconds(7)
            .with_gc_flush_interval_seconds(11);
        assert_eq!(opts.sleep(), Duration::from_secs(2));
        assert_eq!(opts.poll_wait(), Duration::from_secs(7));
        assert_eq!(opts.gc_flush_interval(), Duration::from_secs(11));
    }

    #[test]
    fn blank_endpoint_fails_validation() {
        let opts = WorkerOptions::new().with_mq_endpoint("   ");
        let err = opts.validate().unwrap_err();
        assert!(matches!(err, WorkerError::Config { .. }));
        assert!(WorkerOptions::default().validate().is_ok());
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let opts: WorkerOptions = serde_json::from_str("{\"thread_count\": 8}").unwrap();
        assert_eq!(opts.thread_count, 8);
        assert_eq!(opts.queue_poll_wait_seconds, 15);
        assert!(opts.wait);
    }
}
