// SPDX-License-Identifier: MIT OR Apache-2.0
//! relayq-amqp
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! AMQP-style broker adapter.
//!
//! The broker model is push-oriented with manual acknowledgement. Delayed
//! retries use a per-queue retry exchange: rejected messages are
//! republished there with a per-message TTL and dead-letter back into the
//! main queue once the TTL expires.
//!
//! The wire client is an external collaborator behind the
//! [`AmqpConnector`]/[`AmqpChannel`] traits; [`LapinConnector`] is the
//! lapin-backed implementation.

/// The AMQP-style adapter.
pub mod adapter;
/// Channel and connector abstractions over the wire client.
pub mod client;
/// lapin-backed connector and channel.
pub mod lapin_client;

pub use adapter::AmqpAdapter;
pub use client::{AmqpChannel, AmqpConnector, AmqpDelivery};
pub use lapin_client::LapinConnector;
