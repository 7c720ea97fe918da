// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! relayq-worker
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Worker lifecycle:
//! - validate configuration and configure the adapter (synchronously)
//! - install the SIGINT/SIGTERM watcher
//! - fan out worker groups, each running `pre_process` and then its
//!   consumer loops
//! - every loop: check the running flag, fetch-and-process one message,
//!   pace a memory-flush hint, sleep when the poll came back empty
//! - `stop()` flips the flag and stops the adapter; loops observe the flag
//!   at their next iteration top

/// Memory-flush hint pacing.
pub mod gc;
/// Shutdown signal plumbing.
mod signal;
/// Worker status bookkeeping.
pub mod status;

use gc::FlushPacer;
use relayq_broker::{
    BrokerAdapter, CallbackRegistry, ConsumerHooks, MessageHandler, WorkerContext, WorkerMetrics,
    WorkerOptions,
};
use relayq_core::codec::SerializationProvider;
use relayq_core::{QueueSpec, WorkerError};
use relayq_dedup::NonceGate;
use status::{ProcessStatus, WorkerStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use relayq_broker::MetricsSnapshot;

/// Builder for [`WorkerRuntime`].
#[derive(Default)]
pub struct WorkerBuilder {
    queue: Option<QueueSpec>,
    options: WorkerOptions,
    adapter: Option<Arc<dyn BrokerAdapter>>,
    hooks: CallbackRegistry,
    nonce: Option<Arc<NonceGate>>,
    codec: Option<Arc<dyn SerializationProvider>>,
}

impl WorkerBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue to consume.
    #[must_use]
    pub fn queue(mut self, queue: QueueSpec) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set the worker options.
    #[must_use]
    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the broker adapter (required).
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn BrokerAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Register a callback sink; sinks fire in registration order.
    #[must_use]
    pub fn hook(mut self, hook: Box<dyn ConsumerHooks>) -> Self {
        self.hooks.register(hook);
        self
    }

    /// Replace the default dedup gate.
    #[must_use]
    pub fn nonce_gate(mut self, gate: Arc<NonceGate>) -> Self {
        self.nonce = Some(gate);
        self
    }

    /// Replace the default serialization provider.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn SerializationProvider>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Assemble the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] when the queue or adapter is
    /// missing, or when the options fail validation.
    pub fn build(self) -> Result<WorkerRuntime, WorkerError> {
        let queue = self
            .queue
            .ok_or_else(|| WorkerError::config("a queue spec is required"))?;
        let adapter = self
            .adapter
            .ok_or_else(|| WorkerError::config("a worker adapter is required"))?;
        self.options.validate()?;

        let metrics = Arc::new(WorkerMetrics::new());
        let mut ctx = WorkerContext::new(queue, self.options)
            .with_hooks(Arc::new(self.hooks))
            .with_metrics(Arc::clone(&metrics));
        if let Some(nonce) = self.nonce {
            ctx = ctx.with_nonce(nonce);
        }
        if let Some(codec) = self.codec {
            ctx = ctx.with_codec(codec);
        }

        Ok(WorkerRuntime {
            adapter,
            ctx,
            metrics,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(WorkerStatus::default())),
            groups: Mutex::new(Vec::new()),
            signal_task: Mutex::new(None),
        })
    }
}

/// Drives a [`BrokerAdapter`] with a pool of consumer loops.
pub struct WorkerRuntime {
    adapter: Arc<dyn BrokerAdapter>,
    ctx: WorkerContext,
    metrics: Arc<WorkerMetrics>,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
    groups: Mutex<Vec<JoinHandle<Result<(), WorkerError>>>>,
    signal_task: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerRuntime {
    /// Start building a runtime.
    #[must_use]
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::new()
    }

    /// Whether consumer loops may begin a new fetch.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// The queue being consumed.
    #[must_use]
    pub fn queue(&self) -> &QueueSpec {
        self.ctx.queue()
    }

    /// The options the worker was started with.
    #[must_use]
    pub fn options(&self) -> &WorkerOptions {
        self.ctx.options()
    }

    /// Configured worker-group fan-out.
    #[must_use]
    pub fn fork_count(&self) -> u32 {
        self.ctx.options().fork_count
    }

    /// Configured consumer loops per group.
    #[must_use]
    pub fn thread_count(&self) -> u32 {
        self.ctx.options().thread_count
    }

    /// Configured idle sleep in seconds.
    #[must_use]
    pub fn sleep_seconds(&self) -> u64 {
        self.ctx.options().sleep_seconds
    }

    /// Configured flush-hint interval in seconds.
    #[must_use]
    pub fn gc_flush_interval_seconds(&self) -> u64 {
        self.ctx.options().gc_flush_interval_seconds
    }

    /// Configured broker long-poll wait in seconds.
    #[must_use]
    pub fn queue_poll_wait_seconds(&self) -> u64 {
        self.ctx.options().queue_poll_wait_seconds
    }

    /// Snapshot of the worker's group/loop bookkeeping.
    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Snapshot of the worker counters.
    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validate configuration, configure the adapter, and fan out the
    /// worker groups. Blocks until every group exits when the `wait`
    /// option is set (the default); otherwise the groups detach and
    /// [`join`](Self::join) collects them.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::AlreadyRunning`] when called twice,
    /// [`WorkerError::Config`] for invalid configuration, and — when
    /// waiting — [`WorkerError::Fatal`] if a consumer loop died.
    pub async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), WorkerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyRunning);
        }
        if let Err(e) = self.configure() {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.install_signal_watcher();

        let options = self.ctx.options().clone();
        let group_count = options.fork_count.max(1);
        info!(
            target: "relayq.worker",
            queue = %self.ctx.queue().name,
            adapter = self.adapter.name(),
            groups = group_count,
            loops_per_group = options.thread_count,
            "worker starting"
        );

        let mut groups = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            groups.push(tokio::spawn(run_group(
                group,
                self.adapter.clone(),
                self.ctx.clone(),
                Arc::clone(&handler),
                Arc::clone(&self.running),
                Arc::clone(&self.status),
            )));
        }
        *self.groups.lock().expect("groups lock poisoned") = groups;

        if options.wait { self.join().await } else { Ok(()) }
    }

    /// Wait for every worker group to exit.
    ///
    /// # Errors
    ///
    /// Returns the first [`WorkerError::Fatal`] any group produced.
    pub async fn join(&self) -> Result<(), WorkerError> {
        let groups: Vec<_> = self
            .groups
            .lock()
            .expect("groups lock poisoned")
            .drain(..)
            .collect();
        let mut first_error = None;
        for group in groups {
            match group.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(WorkerError::Fatal {
                            reason: format!("worker group task failed: {join_error}"),
                        });
                    }
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self
            .signal_task
            .lock()
            .expect("signal task lock poisoned")
            .take()
        {
            task.abort();
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Request a cooperative stop: no new fetch begins, the adapter
    /// releases its resources, and loops exit at their next iteration
    /// top. Does not join the loops. Idempotent.
    pub async fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(target: "relayq.worker", queue = %self.ctx.queue().name, "stop requested");
        }
        self.adapter.stop().await;
        if let Some(task) = self
            .signal_task
            .lock()
            .expect("signal task lock poisoned")
            .take()
        {
            task.abort();
        }
    }

    fn configure(&self) -> Result<(), WorkerError> {
        self.ctx.options().validate()?;
        self.adapter.configure(self.ctx.options())
    }

    fn install_signal_watcher(&self) {
        let running = Arc::clone(&self.running);
        let adapter = self.adapter.clone();
        let task = tokio::spawn(async move {
            signal::shutdown_signal().await;
            warn!(target: "relayq.worker", "shutdown signal received, stopping worker");
            running.store(false, Ordering::SeqCst);
            adapter.stop().await;
        });
        *self
            .signal_task
            .lock()
            .expect("signal task lock poisoned") = Some(task);
    }
}

impl std::fmt::Debug for WorkerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRuntime")
            .field("queue", &self.ctx.queue().name)
            .field("adapter", &self.adapter.name())
            .field("running", &self.is_running())
            .finish()
    }
}

/// One worker group: run the adapter's one-shot hook, spawn the consumer
/// loops, and supervise them. A panicking loop is fatal for the whole
/// worker so an external supervisor can restart it.
async fn run_group(
    group: u32,
    adapter: Arc<dyn BrokerAdapter>,
    ctx: WorkerContext,
    handler: Arc<dyn MessageHandler>,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
) -> Result<(), WorkerError> {
    if let Err(e) = adapter.pre_process(&ctx).await {
        ctx.report_error(&e, None);
        running.store(false, Ordering::SeqCst);
        return Err(WorkerError::Fatal {
            reason: format!("pre_process failed for group {group}: {e}"),
        });
    }

    let mut process = ProcessStatus::new(std::process::id(), group);
    let loop_count = ctx.options().thread_count;
    let mut loops = Vec::new();
    if loop_count == 0 {
        let worker_id = process.add_worker();
        status
            .lock()
            .expect("status lock poisoned")
            .processes
            .push(process);
        consumer_loop(
            worker_id,
            adapter,
            ctx,
            handler,
            Arc::clone(&running),
        )
        .await;
        return Ok(());
    }

    for _ in 0..loop_count {
        let worker_id = process.add_worker();
        loops.push(tokio::spawn(consumer_loop(
            worker_id,
            adapter.clone(),
            ctx.clone(),
            Arc::clone(&handler),
            Arc::clone(&running),
        )));
    }
    status
        .lock()
        .expect("status lock poisoned")
        .processes
        .push(process);

    let mut fatal = None;
    for task in loops {
        if let Err(join_error) = task.await
            && fatal.is_none()
        {
            let reason = if join_error.is_panic() {
                format!("consumer loop panicked in group {group}")
            } else {
                format!("consumer loop failed in group {group}: {join_error}")
            };
            error!(target: "relayq.worker", group, reason = %reason, "fatal worker error");
            let err = WorkerError::Fatal {
                reason: reason.clone(),
            };
            ctx.report_error(&err, None);
            running.store(false, Ordering::SeqCst);
            adapter.stop().await;
            fatal = Some(err);
        }
    }
    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// A single consumer loop: fetch, pace the flush hint, idle-sleep on empty
/// polls, exit when the running flag drops.
async fn consumer_loop(
    worker_id: String,
    adapter: Arc<dyn BrokerAdapter>,
    ctx: WorkerContext,
    handler: Arc<dyn MessageHandler>,
    running: Arc<AtomicBool>,
) {
    let pacer = FlushPacer::new(ctx.options().gc_flush_interval());
    info!(
        target: "relayq.worker",
        worker = %worker_id,
        queue = %ctx.queue().name,
        "consumer loop started"
    );
    loop {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let received = adapter.fetch_and_process(&ctx, handler.as_ref()).await;
        pacer.flush(ctx.metrics());
        if !received {
            let sleep = ctx.options().sleep();
            if sleep.is_zero() {
                // An empty poll with no idle sleep must still hand the
                // scheduler a chance to run other tasks.
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(sleep).await;
            }
        }
    }
    info!(target: "relayq.worker", worker = %worker_id, "consumer loop stopped");
}
