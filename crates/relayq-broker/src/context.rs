// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-worker shared state handed to adapters on every fetch.

use crate::hooks::CallbackRegistry;
use crate::options::WorkerOptions;
use crate::telemetry::WorkerMetrics;
use relayq_core::codec::{JsonCodec, SerializationProvider};
use relayq_core::{Message, QueueSpec, WorkerError};
use relayq_dedup::NonceGate;
use relayq_retry::RetryPolicy;
use std::sync::Arc;

/// Everything an adapter needs at fetch time: the queue spec and its retry
/// policy, the worker options, the callback registry, the dedup gate, the
/// serialization provider, and the metrics counters.
///
/// The context is the explicit replacement for a mutable back-pointer into
/// the runtime: adapters invoke callbacks and record metrics through it and
/// never see the runtime itself.
#[derive(Clone)]
pub struct WorkerContext {
    queue: QueueSpec,
    policy: RetryPolicy,
    options: WorkerOptions,
    hooks: Arc<CallbackRegistry>,
    nonce: Arc<NonceGate>,
    codec: Arc<dyn SerializationProvider>,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerContext {
    /// Create a context with default hooks, gate, codec, and metrics.
    #[must_use]
    pub fn new(queue: QueueSpec, options: WorkerOptions) -> Self {
        let policy = RetryPolicy::from_queue(&queue);
        Self {
            queue,
            policy,
            options,
            hooks: Arc::new(CallbackRegistry::new()),
            nonce: Arc::new(NonceGate::default()),
            codec: Arc::new(JsonCodec),
            metrics: Arc::new(WorkerMetrics::new()),
        }
    }

    /// Replace the callback registry.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<CallbackRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the dedup gate.
    #[must_use]
    pub fn with_nonce(mut self, nonce: Arc<NonceGate>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Replace the serialization provider.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn SerializationProvider>) -> Self {
        self.codec = codec;
        self
    }

    /// Replace the metrics counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<WorkerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The queue being consumed.
    #[must_use]
    pub fn queue(&self) -> &QueueSpec {
        &self.queue
    }

    /// The queue's retry policy snapshot.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The worker options.
    #[must_use]
    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// The callback registry.
    #[must_use]
    pub fn hooks(&self) -> &CallbackRegistry {
        &self.hooks
    }

    /// The dedup gate.
    #[must_use]
    pub fn nonce(&self) -> &NonceGate {
        &self.nonce
    }

    /// The serialization provider.
    #[must_use]
    pub fn codec(&self) -> &dyn SerializationProvider {
        self.codec.as_ref()
    }

    /// The metrics counters.
    #[must_use]
    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Route a recoverable error to the callbacks and counters.
    pub fn report_error(&self, error: &WorkerError, message: Option<&Message>) {
        tracing::warn!(
            target: "relayq.broker",
            queue = %self.queue.name,
            %error,
            message_id = message.map(|m| m.id.as_str()),
            "recoverable consumption error"
        );
        self.metrics.record_error();
        self.hooks.fire_error(error, message);
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("queue", &self.queue.name)
            .field("policy", &self.policy)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
