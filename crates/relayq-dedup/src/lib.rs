// SPDX-License-Identifier: MIT OR Apache-2.0
//! relayq-dedup
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Bounded in-process deduplication of message deliveries.
//!
//! The gate tracks each message id through three states: unseen (absent),
//! in flight, and terminal (complete or failed). A redelivery of an id that
//! is in flight or terminal is refused admission until the entry expires or
//! is evicted. The store is bounded by capacity (insertion-order eviction)
//! and by a TTL, so it never grows without limit. Deduplication is
//! process-scoped; cross-process coordination is out of scope.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default entry capacity.
pub const DEFAULT_CAPACITY: usize = 16_384;

/// Default entry time-to-live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3_600);

/// Lifecycle state of a tracked message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceState {
    /// Admitted; the handler has not finished yet.
    InFlight,
    /// Handler finished successfully.
    Complete,
    /// Handler failed or aborted; the message went back to the broker.
    Failed,
}

struct Entry {
    state: NonceState,
    seen_at: Instant,
}

struct GateInner {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
    stats: DedupStats,
}

/// Admission counters for observability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DedupStats {
    /// Total admission checks.
    pub checked: u64,
    /// Ids admitted (handler dispatched).
    pub admitted: u64,
    /// Ids refused as duplicates.
    pub duplicates: u64,
}

/// Thread-safe dedup store with bounded capacity and TTL expiry.
pub struct NonceGate {
    inner: Mutex<GateInner>,
    capacity: usize,
    ttl: Duration,
}

impl NonceGate {
    /// Create a gate with the given capacity and TTL.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(GateInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                stats: DedupStats::default(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Try to admit `id`. Returns `true` only when the id was unseen; the
    /// id transitions to [`NonceState::InFlight`]. In-flight and terminal
    /// ids are refused until eviction or TTL expiry.
    pub fn admit(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("nonce gate lock poisoned");
        inner.stats.checked += 1;
        self.evict(&mut inner);

        if inner.entries.contains_key(id) {
            inner.stats.duplicates += 1;
            debug!(target: "relayq.dedup", id, "duplicate delivery refused");
            return false;
        }

        inner.entries.insert(
            id.to_string(),
            Entry {
                state: NonceState::InFlight,
                seen_at: Instant::now(),
            },
        );
        inner.order.push_back(id.to_string());
        inner.stats.admitted += 1;
        true
    }

    /// Mark an in-flight id as successfully processed.
    pub fn complete(&self, id: &str) {
        self.transition(id, NonceState::Complete);
    }

    /// Mark an in-flight id as failed; the entry stays until evicted so a
    /// fast redelivery is still refused.
    pub fn failed(&self, id: &str) {
        self.transition(id, NonceState::Failed);
    }

    /// Current state of `id`, if tracked.
    pub fn state(&self, id: &str) -> Option<NonceState> {
        let inner = self.inner.lock().expect("nonce gate lock poisoned");
        inner.entries.get(id).map(|e| e.state)
    }

    /// Number of tracked ids.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("nonce gate lock poisoned");
        inner.entries.len()
    }

    /// Whether the gate tracks no ids.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the admission counters.
    pub fn stats(&self) -> DedupStats {
        let inner = self.inner.lock().expect("nonce gate lock poisoned");
        inner.stats
    }

    fn transition(&self, id: &str, to: NonceState) {
        let mut inner = self.inner.lock().expect("nonce gate lock poisoned");
        if let Some(entry) = inner.entries.get_mut(id) {
            entry.state = to;
        }
    }

    fn evict(&self, inner: &mut GateInner) {
        let now = Instant::now();

        // Expired entries first, oldest insertion forward.
        while let Some(front) = inner.order.front() {
            let expired = inner
                .entries
                .get(front)
                .is_none_or(|e| now.duration_since(e.seen_at) >= self.ttl);
            if !expired {
                break;
            }
            let id = inner.order.pop_front().expect("front checked above");
            inner.entries.remove(&id);
        }

        // Then enforce capacity, leaving room for the incoming id.
        while inner.entries.len() >= self.capacity {
            let Some(id) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&id);
            debug!(target: "relayq.dedup", id = %id, "evicted to stay within capacity");
        }
    }
}

impl Default for NonceGate {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl std::fmt::Debug for NonceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceGate")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}
