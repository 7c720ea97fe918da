// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy for the worker runtime.
//!
//! Variants are grouped by how they are handled rather than where they
//! originate: configuration errors fail `start` synchronously, transport
//! and decode errors are absorbed at the iteration boundary, handler and
//! signature failures feed the retry protocol, and fatal errors stop the
//! worker.

use thiserror::Error;

/// Errors produced by the worker runtime and its broker adapters.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Invalid or incomplete configuration; raised synchronously from
    /// `start` or `configure` before any worker state exists.
    #[error("invalid worker configuration: {reason}")]
    Config {
        /// What was missing or malformed.
        reason: String,
    },

    /// `start` was called while the worker was already running.
    #[error("worker is already running")]
    AlreadyRunning,

    /// Connecting to the broker failed.
    #[error("broker connection failed")]
    Connect(#[source] anyhow::Error),

    /// Fetching from a queue failed; absorbed at the iteration boundary.
    #[error("fetch from queue '{queue}' failed")]
    Fetch {
        /// Queue that was being polled.
        queue: String,
        /// Underlying transport error.
        #[source]
        source: anyhow::Error,
    },

    /// A payload could not be serialized for publishing.
    #[error("message payload could not be encoded")]
    Encode(#[source] anyhow::Error),

    /// A received payload could not be decoded into a message.
    #[error("message payload could not be decoded")]
    Decode(#[source] anyhow::Error),

    /// Payload signature verification failed; handled like a handler error.
    #[error("signature verification failed for message {id}")]
    Signature {
        /// Id of the rejected message.
        id: String,
    },

    /// The user handler returned an error; the message is rejected for
    /// retry subject to the queue's policy.
    #[error("handler failed for message {id}")]
    Handler {
        /// Id of the failing message.
        id: String,
        /// Error returned by the handler.
        #[source]
        source: anyhow::Error,
    },

    /// An ack/reject/visibility call to the broker failed after the
    /// handler ran.
    #[error("broker disposition failed for message {id}")]
    Disposition {
        /// Id of the affected message.
        id: String,
        /// Underlying transport error.
        #[source]
        source: anyhow::Error,
    },

    /// A consumer loop died; the worker stops so an external supervisor
    /// can restart it.
    #[error("fatal worker error: {reason}")]
    Fatal {
        /// Description of the failure.
        reason: String,
    },
}

impl WorkerError {
    /// Shorthand for a [`WorkerError::Config`].
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Whether the iteration loop survives this error.
    ///
    /// Recoverable errors are reported through `on_error` and the loop
    /// continues; everything else ends the run.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connect(_)
                | Self::Fetch { .. }
                | Self::Encode(_)
                | Self::Decode(_)
                | Self::Signature { .. }
                | Self::Handler { .. }
                | Self::Disposition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_not_recoverable() {
        assert!(!WorkerError::config("missing client").is_recoverable());
        assert!(!WorkerError::AlreadyRunning.is_recoverable());
        assert!(
            !WorkerError::Fatal {
                reason: "loop died".into()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn iteration_errors_are_recoverable() {
        let fetch = WorkerError::Fetch {
            queue: "orders".into(),
            source: anyhow::anyhow!("socket closed"),
        };
        assert!(fetch.is_recoverable());
        assert!(WorkerError::Decode(anyhow::anyhow!("bad json")).is_recoverable());
        assert!(WorkerError::Signature { id: "m".into() }.is_recoverable());
        assert!(
            WorkerError::Handler {
                id: "m".into(),
                source: anyhow::anyhow!("boom"),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn display_includes_context() {
        let err = WorkerError::Fetch {
            queue: "orders".into(),
            source: anyhow::anyhow!("timeout"),
        };
        assert!(err.to_string().contains("orders"));
        let err = WorkerError::config("mq_endpoint is required");
        assert!(err.to_string().contains("mq_endpoint"));
    }
}
