// SPDX-License-Identifier: MIT OR Apache-2.0
//! Channel and connector abstractions over the AMQP wire client.
//!
//! Connection pooling and frame handling belong to the wire client, not
//! this crate; the adapter only needs the handful of operations below.
//! Channels are scoped to one fetch iteration; the connector owns the
//! longer-lived connection.

use async_trait::async_trait;

/// One received message with its manual-ack tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqpDelivery {
    /// Broker-assigned tag used to ack or reject this delivery.
    pub delivery_tag: u64,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Creates channels on a shared broker connection.
#[async_trait]
pub trait AmqpConnector: Send + Sync {
    /// Open a channel, connecting lazily if needed.
    ///
    /// # Errors
    ///
    /// Returns the wire client's connection error.
    async fn channel(&self) -> anyhow::Result<Box<dyn AmqpChannel>>;

    /// Close the underlying connection. Idempotent; default no-op for
    /// clients without connection state.
    async fn shutdown(&self) {}
}

/// Operations the adapter performs on one channel.
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    /// Declare the main queue.
    ///
    /// # Errors
    ///
    /// Returns the wire client's declare error.
    async fn declare_queue(&self, queue: &str, durable: bool) -> anyhow::Result<()>;

    /// Declare the retry exchange and its TTL buffer queue for `queue`,
    /// wired so expired messages re-enter the main queue. Returns the
    /// exchange name to publish retries to.
    ///
    /// # Errors
    ///
    /// Returns the wire client's declare/bind error.
    async fn declare_retry_exchange(&self, queue: &str, durable: bool) -> anyhow::Result<String>;

    /// Pop at most one message with manual-ack semantics. Non-blocking:
    /// the adapter bounds its own poll window.
    ///
    /// # Errors
    ///
    /// Returns the wire client's get error.
    async fn pop(&self, queue: &str) -> anyhow::Result<Option<AmqpDelivery>>;

    /// Acknowledge a delivery (single message, not multiple).
    ///
    /// # Errors
    ///
    /// Returns the wire client's ack error.
    async fn ack(&self, delivery_tag: u64) -> anyhow::Result<()>;

    /// Reject a delivery without requeueing.
    ///
    /// # Errors
    ///
    /// Returns the wire client's reject error.
    async fn reject(&self, delivery_tag: u64) -> anyhow::Result<()>;

    /// Publish `payload` to `exchange` with a per-message TTL in
    /// milliseconds (the `expiration` property).
    ///
    /// # Errors
    ///
    /// Returns the wire client's publish error.
    async fn publish_with_ttl(
        &self,
        exchange: &str,
        payload: &[u8],
        ttl_ms: u64,
    ) -> anyhow::Result<()>;

    /// Close the channel. Called at the end of every fetch iteration.
    ///
    /// # Errors
    ///
    /// Returns the wire client's close error.
    async fn close(&self) -> anyhow::Result<()>;
}
