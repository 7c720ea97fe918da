// SPDX-License-Identifier: MIT OR Apache-2.0
//! The visibility-timeout adapter.

use crate::client::VisibilityClient;
use async_trait::async_trait;
use relayq_broker::{
    BrokerAdapter, Disposition, HandlerOutcome, MessageHandler, WorkerContext, WorkerOptions,
    decide, dispatch,
};
use relayq_core::codec::Envelope;
use relayq_core::sign::{NullVerifier, SignatureProvider};
use relayq_core::{Message, WorkerError};
use relayq_retry::{backoff_delay_ms, visibility_timeout_secs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Adapter for pull-based queues where redelivery is driven by the
/// broker's visibility timeout.
///
/// Retry never republishes: the rejected message's visibility is extended
/// by the computed backoff (whole seconds, clamped to twelve hours) and
/// the broker redelivers it when the timeout expires, incrementing its
/// delivery count. Terminal rejection deletes the message.
pub struct VisibilityAdapter {
    client: Mutex<Option<Arc<dyn VisibilityClient>>>,
    verifier: Arc<dyn SignatureProvider>,
    queue_url: Mutex<Option<String>>,
    stopped: AtomicBool,
}

impl VisibilityAdapter {
    /// Create an adapter without a client; `configure` will fail until one
    /// is provided.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Mutex::new(None),
            verifier: Arc::new(NullVerifier),
            queue_url: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Create an adapter with an explicit client.
    #[must_use]
    pub fn with_client(client: Arc<dyn VisibilityClient>) -> Self {
        let adapter = Self::new();
        *adapter.client.lock().expect("client lock poisoned") = Some(client);
        adapter
    }

    /// Replace the signature provider (accept-all by default).
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureProvider>) -> Self {
        self.verifier = verifier;
        self
    }

    fn client(&self) -> Option<Arc<dyn VisibilityClient>> {
        self.client.lock().expect("client lock poisoned").clone()
    }

    /// Resolve and cache the queue URL.
    async fn queue_url(
        &self,
        client: &dyn VisibilityClient,
        queue: &str,
    ) -> anyhow::Result<String> {
        if let Some(url) = self
            .queue_url
            .lock()
            .expect("queue url lock poisoned")
            .clone()
        {
            return Ok(url);
        }
        let url = client.resolve_queue_url(queue).await?;
        *self.queue_url.lock().expect("queue url lock poisoned") = Some(url.clone());
        Ok(url)
    }

    async fn delete_reporting(
        &self,
        ctx: &WorkerContext,
        client: &dyn VisibilityClient,
        queue_url: &str,
        receipt_handle: &str,
        message: &Message,
    ) -> bool {
        match client.delete(queue_url, receipt_handle).await {
            Ok(()) => true,
            Err(source) => {
                ctx.report_error(
                    &WorkerError::Disposition {
                        id: message.id.clone(),
                        source,
                    },
                    Some(message),
                );
                false
            }
        }
    }
}

impl Default for VisibilityAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerAdapter for VisibilityAdapter {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn configure(&self, _options: &WorkerOptions) -> Result<(), WorkerError> {
        if self.client().is_none() {
            return Err(WorkerError::config("visibility adapter needs a client"));
        }
        self.stopped.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn pre_process(&self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        let client = self
            .client()
            .ok_or_else(|| WorkerError::config("visibility adapter is not configured"))?;
        self.queue_url(client.as_ref(), &ctx.queue().name)
            .await
            .map_err(WorkerError::Connect)?;
        Ok(())
    }

    async fn fetch_and_process(&self, ctx: &WorkerContext, handler: &dyn MessageHandler) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return false;
        }
        let Some(client) = self.client() else {
            ctx.report_error(
                &WorkerError::config("visibility adapter is not configured"),
                None,
            );
            return false;
        };
        let queue = ctx.queue().name.clone();
        let queue_url = match self.queue_url(client.as_ref(), &queue).await {
            Ok(url) => url,
            Err(source) => {
                ctx.report_error(&WorkerError::Fetch { queue, source }, None);
                return false;
            }
        };

        let delivery = match client
            .receive(&queue_url, ctx.options().queue_poll_wait_seconds)
            .await
        {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return false,
            Err(source) => {
                ctx.report_error(&WorkerError::Fetch { queue, source }, None);
                return false;
            }
        };
        ctx.metrics().record_fetched();

        // An unparsable body stays invisible until its timeout expires and
        // the broker redelivers it.
        let envelope = match Envelope::parse(&delivery.body) {
            Ok(envelope) => envelope,
            Err(error) => {
                ctx.report_error(&error, None);
                return false;
            }
        };
        let mut message = match ctx.codec().decode(envelope.message.as_bytes()) {
            Ok(message) => message,
            Err(error) => {
                ctx.report_error(&error, None);
                return false;
            }
        };
        // The broker's delivery count is authoritative here; whatever the
        // payload carried is overwritten.
        message.retry_attempts = delivery.receive_count.saturating_sub(1);

        let outcome = if self
            .verifier
            .verify(envelope.message.as_bytes(), envelope.signature.as_deref())
        {
            match dispatch(ctx, &message, handler).await {
                Some(outcome) => outcome,
                None => {
                    // Duplicate delivery: delete without a handler call.
                    self.delete_reporting(ctx, client.as_ref(), &queue_url, &delivery.receipt_handle, &message)
                        .await;
                    return true;
                }
            }
        } else {
            // Signature failures take the handler-error path: reported,
            // then rejected for retry subject to policy.
            ctx.report_error(
                &WorkerError::Signature {
                    id: message.id.clone(),
                },
                Some(&message),
            );
            HandlerOutcome::Failed
        };

        match decide(ctx.policy(), outcome, message.retry_attempts) {
            Disposition::Ack => {
                if self
                    .delete_reporting(ctx, client.as_ref(), &queue_url, &delivery.receipt_handle, &message)
                    .await
                {
                    ctx.metrics().record_acked();
                }
            }
            Disposition::Retry => {
                // The delivery count is already the attempt being retried;
                // floor at one so the very first failure still backs off.
                let attempt = message.retry_attempts.max(1);
                let delay_ms = backoff_delay_ms(attempt, ctx.policy());
                let timeout_seconds = visibility_timeout_secs(delay_ms);
                match client
                    .change_visibility(&queue_url, &delivery.receipt_handle, timeout_seconds)
                    .await
                {
                    Ok(()) => {
                        debug!(
                            target: "relayq.visibility",
                            message_id = %message.id,
                            retry_attempts = message.retry_attempts,
                            timeout_seconds,
                            "retry scheduled via visibility timeout"
                        );
                        ctx.metrics().record_retried();
                        ctx.hooks().fire_retry(&message, outcome.abort_flag());
                    }
                    Err(source) => ctx.report_error(
                        &WorkerError::Disposition {
                            id: message.id.clone(),
                            source,
                        },
                        Some(&message),
                    ),
                }
            }
            Disposition::Exceeded => {
                if self
                    .delete_reporting(ctx, client.as_ref(), &queue_url, &delivery.receipt_handle, &message)
                    .await
                {
                    ctx.metrics().record_exceeded();
                    ctx.hooks().fire_retry_exceeded(&message);
                }
            }
            Disposition::Drop => {
                self.delete_reporting(ctx, client.as_ref(), &queue_url, &delivery.receipt_handle, &message)
                    .await;
            }
        }
        true
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.queue_url
            .lock()
            .expect("queue url lock poisoned")
            .take();
    }
}
