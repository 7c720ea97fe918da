// SPDX-License-Identifier: MIT OR Apache-2.0
//! The broker adapter and message handler contracts.

use crate::context::WorkerContext;
use crate::options::WorkerOptions;
use async_trait::async_trait;
use relayq_core::{MessageArgs, WorkerError};

/// A broker backend the worker runtime can drive.
///
/// Implementations hide a concrete broker's acknowledgement, redelivery,
/// and delay model. Every adapter must satisfy the dispatch invariants:
/// exactly one of ack / retry-requeue / terminal-drop per admitted message
/// before `fetch_and_process` returns, duplicates dropped from the broker
/// without a handler call, handler errors and aborts rejected for retry
/// subject to policy (errors additionally reported through `on_error`).
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Short identifier used in logs and status output.
    fn name(&self) -> &'static str;

    /// Validate and store adapter-specific options.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] when a required input (client,
    /// endpoint) is missing or malformed. Called synchronously from the
    /// runtime's `start`, before any worker state exists.
    fn configure(&self, options: &WorkerOptions) -> Result<(), WorkerError>;

    /// One-shot hook before the consumer loops spawn. Defaults to a no-op.
    ///
    /// # Errors
    ///
    /// An error here aborts the start sequence.
    async fn pre_process(&self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Fetch at most one message and run it through the dispatch engine.
    ///
    /// Blocks up to the configured poll wait. Returns `true` when a message
    /// was received and disposed of (including the duplicate-drop case),
    /// `false` when the poll came back empty. Errors never propagate: they
    /// are routed to the context's error callbacks and the iteration
    /// reports `false`.
    async fn fetch_and_process(&self, ctx: &WorkerContext, handler: &dyn MessageHandler) -> bool;

    /// Release adapter-held resources. Idempotent.
    async fn stop(&self);
}

/// User-supplied message consumer.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message.
    ///
    /// `args` is read-only except for `abort`: setting it requests
    /// rejection without raising.
    ///
    /// # Errors
    ///
    /// An error is caught by the adapter, reported through `on_error`, and
    /// rejects the message for retry subject to the queue's policy.
    async fn handle(
        &self,
        content: &serde_json::Value,
        args: &mut MessageArgs,
    ) -> anyhow::Result<()>;
}

/// Wraps a plain closure as a [`MessageHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&serde_json::Value, &mut MessageArgs) -> anyhow::Result<()> + Send + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&serde_json::Value, &mut MessageArgs) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(
        &self,
        content: &serde_json::Value,
        args: &mut MessageArgs,
    ) -> anyhow::Result<()> {
        (self.0)(content, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_core::Message;
    use serde_json::json;

    #[tokio::test]
    async fn fn_handler_passes_content_and_args_through() {
        let handler = FnHandler::new(|content, args| {
            if content["fail"] == json!(true) {
                anyhow::bail!("requested failure");
            }
            if content["abort"] == json!(true) {
                args.abort = true;
            }
            Ok(())
        });

        let msg = Message::new("t", json!({"abort": true}));
        let mut args = msg.args();
        handler.handle(&msg.content, &mut args).await.unwrap();
        assert!(args.abort);

        let msg = Message::new("t", json!({"fail": true}));
        let mut args = msg.args();
        assert!(handler.handle(&msg.content, &mut args).await.is_err());
    }
}
