// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consumer callback sinks.
//!
//! Register [`ConsumerHooks`] implementations with a [`CallbackRegistry`]
//! to observe errors, retry scheduling, and retry exhaustion without
//! touching the dispatch loop. Hook errors are logged and swallowed; a
//! misbehaving callback never takes the worker down.

use relayq_core::{Message, WorkerError};

/// Result type for individual hook invocations.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Extension point fired at well-defined moments of message consumption.
///
/// All methods default to no-ops so sinks only override what they need.
pub trait ConsumerHooks: Send + Sync {
    /// Called when the adapter catches an error during fetch, decode, or
    /// handler invocation. `message` is absent when the failure happened
    /// before the payload could be decoded.
    fn on_error(&self, _error: &WorkerError, _message: Option<&Message>) -> HookResult {
        Ok(())
    }

    /// Called after each successful reject-for-retry scheduling. `abort`
    /// reports whether the handler requested the rejection (as opposed to
    /// failing).
    fn on_retry(&self, _message: &Message, _abort: bool) -> HookResult {
        Ok(())
    }

    /// Called exactly once per message that reaches the delivery maximum
    /// and is terminally rejected.
    fn on_retry_exceeded(&self, _message: &Message) -> HookResult {
        Ok(())
    }

    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;
}

/// Ordered collection of [`ConsumerHooks`], fired in registration order.
#[derive(Default)]
pub struct CallbackRegistry {
    hooks: Vec<Box<dyn ConsumerHooks>>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append a sink. Sinks fire in the order they are registered.
    pub fn register(&mut self, hook: Box<dyn ConsumerHooks>) {
        self.hooks.push(hook);
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Fire `on_error` on every sink, logging sink failures.
    pub fn fire_error(&self, error: &WorkerError, message: Option<&Message>) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_error(error, message) {
                tracing::error!(
                    target: "relayq.hooks",
                    hook = hook.name(),
                    error = %e,
                    "on_error hook failed"
                );
            }
        }
    }

    /// Fire `on_retry` on every sink, logging sink failures.
    pub fn fire_retry(&self, message: &Message, abort: bool) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_retry(message, abort) {
                tracing::error!(
                    target: "relayq.hooks",
                    hook = hook.name(),
                    error = %e,
                    "on_retry hook failed"
                );
            }
        }
    }

    /// Fire `on_retry_exceeded` on every sink, logging sink failures.
    pub fn fire_retry_exceeded(&self, message: &Message) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_retry_exceeded(message) {
                tracing::error!(
                    target: "relayq.hooks",
                    hook = hook.name(),
                    error = %e,
                    "on_retry_exceeded hook failed"
                );
            }
        }
    }
}

/// Logs consumption events via `tracing`.
pub struct LoggingHooks;

impl ConsumerHooks for LoggingHooks {
    fn on_error(&self, error: &WorkerError, message: Option<&Message>) -> HookResult {
        tracing::error!(
            target: "relayq.hooks",
            %error,
            message_id = message.map(|m| m.id.as_str()),
            "consumption error"
        );
        Ok(())
    }

    fn on_retry(&self, message: &Message, abort: bool) -> HookResult {
        tracing::warn!(
            target: "relayq.hooks",
            message_id = %message.id,
            retry_attempts = message.retry_attempts,
            abort,
            "message scheduled for retry"
        );
        Ok(())
    }

    fn on_retry_exceeded(&self, message: &Message) -> HookResult {
        tracing::error!(
            target: "relayq.hooks",
            message_id = %message.id,
            retry_attempts = message.retry_attempts,
            "message exceeded its retry budget"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}
