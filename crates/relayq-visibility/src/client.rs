// SPDX-License-Identifier: MIT OR Apache-2.0
//! Queue client abstraction over the cloud wire client.

use async_trait::async_trait;

/// One received message with its receipt handle and delivery count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityDelivery {
    /// Raw message body (the outer envelope JSON).
    pub body: String,
    /// Handle used to delete the message or change its visibility.
    pub receipt_handle: String,
    /// How many times the broker has delivered this message, starting at 1
    /// on the first delivery.
    pub receive_count: u32,
}

/// Operations the adapter performs against the cloud queue service.
///
/// Implementations must request the delivery-count attribute on every
/// receive so [`VisibilityDelivery::receive_count`] is populated.
#[async_trait]
pub trait VisibilityClient: Send + Sync {
    /// Resolve the queue name to its URL. The adapter caches the result.
    ///
    /// # Errors
    ///
    /// Returns the wire client's lookup error.
    async fn resolve_queue_url(&self, queue: &str) -> anyhow::Result<String>;

    /// Long-poll for at most one message, waiting up to `wait_seconds`.
    ///
    /// # Errors
    ///
    /// Returns the wire client's receive error.
    async fn receive(
        &self,
        queue_url: &str,
        wait_seconds: u64,
    ) -> anyhow::Result<Option<VisibilityDelivery>>;

    /// Delete a message permanently.
    ///
    /// # Errors
    ///
    /// Returns the wire client's delete error.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> anyhow::Result<()>;

    /// Extend a message's visibility timeout, in whole seconds.
    ///
    /// # Errors
    ///
    /// Returns the wire client's visibility error.
    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: u64,
    ) -> anyhow::Result<()>;
}
