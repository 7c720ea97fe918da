// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! relayq-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for the relayq worker runtime.

/// Serialization providers and the cloud envelope codec.
pub mod codec;
/// The `WorkerError` taxonomy shared across the workspace.
pub mod error;
/// Signature providers for payload authenticity checks.
pub mod sign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::WorkerError;

/// A single queue message as it travels between broker and handler.
///
/// `retry_attempts` counts prior redeliveries: it is `0` on first delivery.
/// The AMQP-style broker stores the counter inside the payload and
/// republishes it on retry; the visibility-timeout broker derives it from
/// the delivery count it tracks itself. The message is immutable to the
/// handler except through the ack/abort decision on [`MessageArgs`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: String,

    /// Message type tag, routing-level metadata for handlers.
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque payload body.
    pub content: serde_json::Value,

    /// When the producer created the message.
    pub created: DateTime<Utc>,

    /// Number of prior redeliveries (0 on first delivery).
    #[serde(default)]
    pub retry_attempts: u32,

    /// Optional opaque producer context carried alongside the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,

    /// Optional content-type tag for the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Message {
    /// Create a message with a fresh id, the given type tag and content,
    /// timestamped now.
    #[must_use]
    pub fn new(kind: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            content,
            created: Utc::now(),
            retry_attempts: 0,
            context: None,
            content_type: None,
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the retry counter (used by tests and the AMQP retry path).
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Attach producer context.
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the content-type tag.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Build the handler-visible view of this message.
    #[must_use]
    pub fn args(&self) -> MessageArgs {
        MessageArgs {
            kind: self.kind.clone(),
            retry_attempts: self.retry_attempts,
            id: self.id.clone(),
            sent: self.created,
            context: self.context.clone(),
            content_type: self.content_type.clone(),
            abort: false,
        }
    }
}

/// Handler-visible view of a [`Message`].
///
/// Every field mirrors the message read-only; `abort` is the single field a
/// handler may write. Setting it to `true` requests rejection without
/// raising an error.
#[derive(Debug, Clone)]
pub struct MessageArgs {
    /// Message type tag.
    pub kind: String,
    /// Number of prior redeliveries observed by the broker.
    pub retry_attempts: u32,
    /// Message id.
    pub id: String,
    /// When the producer created the message.
    pub sent: DateTime<Utc>,
    /// Optional producer context.
    pub context: Option<serde_json::Value>,
    /// Optional content-type tag.
    pub content_type: Option<String>,
    /// Set by the handler to request rejection without raising.
    pub abort: bool,
}

/// Per-queue configuration, immutable after worker start.
///
/// The retry knobs feed the backoff calculator and the adapters'
/// disposition logic; nothing in here changes at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSpec {
    /// Queue name as known to the broker.
    pub name: String,

    /// Deliveries after which a failing message is terminally rejected.
    pub max_retry_attempts: u32,

    /// Whether failed messages are rescheduled at all.
    pub allow_retry: bool,

    /// Whether the retry delay grows with the attempt number.
    pub allow_retry_back_off: bool,

    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,

    /// Upper bound on the computed retry delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl QueueSpec {
    /// Create a spec for `name` with default retry settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_retry_attempts: 5,
            allow_retry: true,
            allow_retry_back_off: false,
            retry_delay_ms: 30_000,
            max_retry_delay_ms: 1_800_000,
        }
    }

    /// Set the maximum delivery count before terminal rejection.
    #[must_use]
    pub fn with_max_retry_attempts(mut self, max: u32) -> Self {
        self.max_retry_attempts = max;
        self
    }

    /// Enable or disable retries entirely.
    #[must_use]
    pub fn with_allow_retry(mut self, allow: bool) -> Self {
        self.allow_retry = allow;
        self
    }

    /// Enable or disable growing backoff.
    #[must_use]
    pub fn with_back_off(mut self, back_off: bool) -> Self {
        self.allow_retry_back_off = back_off;
        self
    }

    /// Set the base retry delay in milliseconds.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Set the retry delay ceiling in milliseconds.
    #[must_use]
    pub fn with_max_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_retry_delay_ms = delay_ms;
        self
    }
}
