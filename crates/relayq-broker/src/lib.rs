// SPDX-License-Identifier: MIT OR Apache-2.0
//! relayq-broker
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The broker adapter contract and everything both adapters share: the
//! handler contract, worker options, consumer callbacks, the per-worker
//! context, worker metrics, and the admit → dispatch → disposition engine.
//!
//! A [`BrokerAdapter`](adapter::BrokerAdapter) hides a broker's
//! acknowledgement and redelivery model behind four capabilities
//! (`configure`, `pre_process`, `fetch_and_process`, `stop`); the worker
//! runtime drives any adapter through this crate without knowing which
//! broker is underneath.

/// The broker adapter and message handler contracts.
pub mod adapter;
/// Per-worker shared state handed to adapters on every fetch.
pub mod context;
/// The shared admission, handler dispatch, and disposition logic.
pub mod dispatch;
/// Consumer callback sinks and their registry.
pub mod hooks;
/// Worker configuration options.
pub mod options;
/// Worker counters for observability.
pub mod telemetry;

pub use adapter::{BrokerAdapter, FnHandler, MessageHandler};
pub use context::WorkerContext;
pub use dispatch::{Disposition, HandlerOutcome, decide, dispatch};
pub use hooks::{CallbackRegistry, ConsumerHooks, LoggingHooks};
pub use options::WorkerOptions;
pub use telemetry::{MetricsSnapshot, WorkerMetrics};
