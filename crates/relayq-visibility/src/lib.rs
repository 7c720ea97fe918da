// SPDX-License-Identifier: MIT OR Apache-2.0
//! relayq-visibility
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Visibility-timeout (cloud-style) broker adapter.
//!
//! The broker model is pull-based: a received message stays hidden for its
//! visibility timeout and redelivers unless deleted. Retries never
//! republish; the adapter extends the timeout with the computed backoff
//! instead, and the broker's own delivery count is the authoritative retry
//! counter (`retry_attempts = receive_count - 1`).
//!
//! The wire client is an external collaborator behind [`VisibilityClient`];
//! no real cloud SDK ships here.

/// The visibility-timeout adapter.
pub mod adapter;
/// Queue client abstraction over the wire client.
pub mod client;

pub use adapter::VisibilityAdapter;
pub use client::{VisibilityClient, VisibilityDelivery};
