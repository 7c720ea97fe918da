// SPDX-License-Identifier: MIT OR Apache-2.0
//! The AMQP-style adapter.

use crate::client::{AmqpChannel, AmqpConnector, AmqpDelivery};
use crate::lapin_client::LapinConnector;
use async_trait::async_trait;
use relayq_broker::{
    BrokerAdapter, Disposition, MessageHandler, WorkerContext, WorkerOptions, decide, dispatch,
};
use relayq_core::WorkerError;
use relayq_retry::backoff_delay_ms;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Interval between basic-get attempts inside one poll window.
const POP_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Adapter for push-based brokers with manual ack and retry exchanges.
///
/// Each fetch iteration opens a fresh channel, declares the queue and its
/// retry exchange, pops at most one message, runs the dispatch engine, and
/// closes the channel. Delayed retries republish the message (with its
/// retry counter incremented) to the retry exchange under a per-message
/// TTL.
pub struct AmqpAdapter {
    connector: Mutex<Option<std::sync::Arc<dyn AmqpConnector>>>,
    durable: AtomicBool,
    stopped: AtomicBool,
}

impl AmqpAdapter {
    /// Create an adapter without a client; `configure` will build a lapin
    /// connector from `mq_endpoint`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connector: Mutex::new(None),
            durable: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    /// Create an adapter with an explicit client.
    #[must_use]
    pub fn with_connector(connector: std::sync::Arc<dyn AmqpConnector>) -> Self {
        let adapter = Self::new();
        *adapter
            .connector
            .lock()
            .expect("connector lock poisoned") = Some(connector);
        adapter
    }

    fn connector(&self) -> Option<std::sync::Arc<dyn AmqpConnector>> {
        self.connector
            .lock()
            .expect("connector lock poisoned")
            .clone()
    }

    /// Bounded poll: pop until a message arrives, the window elapses, or
    /// the adapter is stopped.
    async fn pop_within_window(
        &self,
        ctx: &WorkerContext,
        channel: &dyn AmqpChannel,
    ) -> anyhow::Result<Option<AmqpDelivery>> {
        let deadline = tokio::time::Instant::now() + ctx.options().poll_wait();
        loop {
            if let Some(delivery) = channel.pop(&ctx.queue().name).await? {
                return Ok(Some(delivery));
            }
            if self.stopped.load(Ordering::Relaxed)
                || tokio::time::Instant::now() + POP_RETRY_INTERVAL > deadline
            {
                return Ok(None);
            }
            tokio::time::sleep(POP_RETRY_INTERVAL).await;
        }
    }

    async fn consume_one(
        &self,
        ctx: &WorkerContext,
        handler: &dyn MessageHandler,
        channel: &dyn AmqpChannel,
    ) -> bool {
        let queue = ctx.queue().name.clone();
        let durable = self.durable.load(Ordering::Relaxed);

        if let Err(source) = channel.declare_queue(&queue, durable).await {
            ctx.report_error(
                &WorkerError::Fetch {
                    queue,
                    source,
                },
                None,
            );
            return false;
        }
        let retry_exchange = match channel.declare_retry_exchange(&queue, durable).await {
            Ok(exchange) => exchange,
            Err(source) => {
                ctx.report_error(
                    &WorkerError::Fetch {
                        queue,
                        source,
                    },
                    None,
                );
                return false;
            }
        };

        let delivery = match self.pop_within_window(ctx, channel).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return false,
            Err(source) => {
                ctx.report_error(
                    &WorkerError::Fetch {
                        queue,
                        source,
                    },
                    None,
                );
                return false;
            }
        };
        ctx.metrics().record_fetched();

        // A payload that cannot be decoded is handled like a fetch error:
        // reported, left unacked, and returned to the broker when the
        // channel closes.
        let message = match ctx.codec().decode(&delivery.payload) {
            Ok(message) => message,
            Err(error) => {
                ctx.report_error(&error, None);
                return false;
            }
        };

        let Some(outcome) = dispatch(ctx, &message, handler).await else {
            // Duplicate delivery: drop it from the broker without a
            // handler call; the iteration still received a message.
            if let Err(source) = channel.ack(delivery.delivery_tag).await {
                ctx.report_error(
                    &WorkerError::Disposition {
                        id: message.id.clone(),
                        source,
                    },
                    Some(&message),
                );
            }
            return true;
        };

        match decide(ctx.policy(), outcome, message.retry_attempts) {
            Disposition::Ack => {
                match channel.ack(delivery.delivery_tag).await {
                    Ok(()) => ctx.metrics().record_acked(),
                    Err(source) => ctx.report_error(
                        &WorkerError::Disposition {
                            id: message.id.clone(),
                            source,
                        },
                        Some(&message),
                    ),
                }
            }
            Disposition::Retry => {
                if let Err(source) = channel.reject(delivery.delivery_tag).await {
                    ctx.report_error(
                        &WorkerError::Disposition {
                            id: message.id.clone(),
                            source,
                        },
                        Some(&message),
                    );
                    return true;
                }
                let mut retried = message.clone();
                retried.retry_attempts += 1;
                let delay_ms = backoff_delay_ms(retried.retry_attempts, ctx.policy());
                match ctx.codec().encode(&retried) {
                    Ok(payload) => {
                        match channel
                            .publish_with_ttl(&retry_exchange, &payload, delay_ms)
                            .await
                        {
                            Ok(()) => {
                                debug!(
                                    target: "relayq.amqp",
                                    message_id = %retried.id,
                                    retry_attempts = retried.retry_attempts,
                                    delay_ms,
                                    "retry scheduled via retry exchange"
                                );
                                ctx.metrics().record_retried();
                                ctx.hooks().fire_retry(&retried, outcome.abort_flag());
                            }
                            Err(source) => ctx.report_error(
                                &WorkerError::Disposition {
                                    id: retried.id.clone(),
                                    source,
                                },
                                Some(&retried),
                            ),
                        }
                    }
                    Err(error) => ctx.report_error(&error, Some(&retried)),
                }
            }
            Disposition::Exceeded => {
                if let Err(source) = channel.reject(delivery.delivery_tag).await {
                    ctx.report_error(
                        &WorkerError::Disposition {
                            id: message.id.clone(),
                            source,
                        },
                        Some(&message),
                    );
                    return true;
                }
                ctx.metrics().record_exceeded();
                ctx.hooks().fire_retry_exceeded(&message);
            }
            Disposition::Drop => {
                // Retries disabled with budget left: reject with no
                // reschedule and no callback.
                if let Err(source) = channel.reject(delivery.delivery_tag).await {
                    ctx.report_error(
                        &WorkerError::Disposition {
                            id: message.id.clone(),
                            source,
                        },
                        Some(&message),
                    );
                }
            }
        }
        true
    }
}

impl Default for AmqpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerAdapter for AmqpAdapter {
    fn name(&self) -> &'static str {
        "amqp"
    }

    fn configure(&self, options: &WorkerOptions) -> Result<(), WorkerError> {
        let mut guard = self.connector.lock().expect("connector lock poisoned");
        if guard.is_none() {
            let endpoint = options
                .mq_endpoint
                .as_deref()
                .ok_or_else(|| WorkerError::config("amqp adapter needs a client or mq_endpoint"))?;
            *guard = Some(std::sync::Arc::new(LapinConnector::new(endpoint)));
        }
        self.durable.store(options.durable, Ordering::Relaxed);
        self.stopped.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn fetch_and_process(&self, ctx: &WorkerContext, handler: &dyn MessageHandler) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return false;
        }
        let Some(connector) = self.connector() else {
            ctx.report_error(&WorkerError::config("amqp adapter is not configured"), None);
            return false;
        };
        let channel = match connector.channel().await {
            Ok(channel) => channel,
            Err(source) => {
                ctx.report_error(&WorkerError::Connect(source), None);
                return false;
            }
        };
        let received = self.consume_one(ctx, handler, channel.as_ref()).await;
        if let Err(error) = channel.close().await {
            debug!(target: "relayq.amqp", %error, "channel close failed");
        }
        received
    }

    async fn stop(&self) {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return;
        }
        if let Some(connector) = self.connector() {
            connector.shutdown().await;
        }
    }
}
