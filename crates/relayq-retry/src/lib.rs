// SPDX-License-Identifier: MIT OR Apache-2.0
//! relayq-retry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Retry policy and backoff calculation.
//!
//! [`RetryPolicy`] is an immutable snapshot of a queue's retry knobs;
//! [`backoff_delay_ms`] is the pure attempt → delay function shared by both
//! broker adapters. The visibility-timeout conversion applies the broker's
//! hard ceiling of 12 hours.

use relayq_core::QueueSpec;
use serde::{Deserialize, Serialize};

/// Hard ceiling on a visibility timeout, in seconds (12 hours).
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 43_200;

/// Immutable retry configuration derived from a [`QueueSpec`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Deliveries after which a failing message is terminally rejected.
    pub max_retry_attempts: u32,
    /// Whether failed messages are rescheduled at all.
    pub allow_retry: bool,
    /// Whether the delay grows with the attempt number.
    pub allow_retry_back_off: bool,
    /// Base delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Ceiling on the computed delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl RetryPolicy {
    /// Snapshot the retry knobs of a queue spec.
    #[must_use]
    pub fn from_queue(spec: &QueueSpec) -> Self {
        Self {
            max_retry_attempts: spec.max_retry_attempts,
            allow_retry: spec.allow_retry,
            allow_retry_back_off: spec.allow_retry_back_off,
            retry_delay_ms: spec.retry_delay_ms,
            max_retry_delay_ms: spec.max_retry_delay_ms,
        }
    }

    /// Whether `attempts` deliveries have exhausted this policy.
    #[must_use]
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_retry_attempts
    }
}

/// Compute the delay before the given retry attempt, in milliseconds.
///
/// `attempt` is the attempt number being scheduled: the AMQP adapter passes
/// the already-incremented per-message counter, the visibility adapter the
/// counter derived from the broker's delivery count.
///
/// With backoff disabled the base delay is returned unchanged; with backoff
/// enabled the delay grows linearly and is capped at the policy ceiling.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, policy: &RetryPolicy) -> u64 {
    if !policy.allow_retry_back_off {
        return policy.retry_delay_ms;
    }
    let scaled = u64::from(attempt).saturating_mul(policy.retry_delay_ms);
    scaled.min(policy.max_retry_delay_ms)
}

/// Convert a millisecond delay into a visibility timeout in whole seconds,
/// clamped to [`MAX_VISIBILITY_TIMEOUT_SECS`].
#[must_use]
pub fn visibility_timeout_secs(delay_ms: u64) -> u64 {
    (delay_ms / 1_000).min(MAX_VISIBILITY_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_core::QueueSpec;

    fn policy(base: u64, cap: u64, back_off: bool) -> RetryPolicy {
        RetryPolicy::from_queue(
            &QueueSpec::new("q")
                .with_retry_delay_ms(base)
                .with_max_retry_delay_ms(cap)
                .with_back_off(back_off),
        )
    }

    #[test]
    fn from_queue_snapshots_every_knob() {
        let spec = QueueSpec::new("q")
            .with_max_retry_attempts(7)
            .with_allow_retry(false)
            .with_back_off(true)
            .with_retry_delay_ms(250)
            .with_max_retry_delay_ms(9_000);
        let policy = RetryPolicy::from_queue(&spec);
        assert_eq!(policy.max_retry_attempts, 7);
        assert!(!policy.allow_retry);
        assert!(policy.allow_retry_back_off);
        assert_eq!(policy.retry_delay_ms, 250);
        assert_eq!(policy.max_retry_delay_ms, 9_000);
    }

    #[test]
    fn without_back_off_delay_is_constant() {
        let p = policy(1_000, 30_000, false);
        assert_eq!(backoff_delay_ms(1, &p), 1_000);
        assert_eq!(backoff_delay_ms(50, &p), 1_000);
    }

    #[test]
    fn back_off_scales_linearly() {
        let p = policy(1_000, 30_000, true);
        assert_eq!(backoff_delay_ms(1, &p), 1_000);
        assert_eq!(backoff_delay_ms(3, &p), 3_000);
        assert_eq!(backoff_delay_ms(30, &p), 30_000);
    }

    #[test]
    fn back_off_is_capped() {
        let p = policy(1_000, 30_000, true);
        assert_eq!(backoff_delay_ms(31, &p), 30_000);
        assert_eq!(backoff_delay_ms(u32::MAX, &p), 30_000);
    }

    #[test]
    fn visibility_conversion_floors_to_seconds() {
        assert_eq!(visibility_timeout_secs(600_000), 600);
        assert_eq!(visibility_timeout_secs(1_999), 1);
        assert_eq!(visibility_timeout_secs(999), 0);
    }

    #[test]
    fn visibility_conversion_clamps_to_twelve_hours() {
        // 50,000,000 ms = 50,000 s, above the 43,200 s ceiling.
        assert_eq!(visibility_timeout_secs(50_000_000), MAX_VISIBILITY_TIMEOUT_SECS);
        assert_eq!(visibility_timeout_secs(u64::MAX), MAX_VISIBILITY_TIMEOUT_SECS);
    }

    #[test]
    fn exhaustion_is_at_or_over_max() {
        let p = RetryPolicy::from_queue(&QueueSpec::new("q").with_max_retry_attempts(3));
        assert!(!p.is_exhausted(2));
        assert!(p.is_exhausted(3));
        assert!(p.is_exhausted(4));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delay_is_monotone_when_backing_off(
                base in 1u64..1_000_000,
                cap in 1u64..100_000_000,
                attempt in 1u32..10_000,
            ) {
                let p = policy(base, cap, true);
                prop_assert!(backoff_delay_ms(attempt, &p) <= backoff_delay_ms(attempt + 1, &p));
            }

            #[test]
            fn delay_never_exceeds_cap(
                base in 1u64..1_000_000,
                cap in 1u64..100_000_000,
                attempt in 1u32..10_000,
            ) {
                let p = policy(base, cap, true);
                prop_assert!(backoff_delay_ms(attempt, &p) <= cap);
            }

            #[test]
            fn visibility_never_exceeds_ceiling(delay_ms in 0u64..u64::MAX) {
                prop_assert!(visibility_timeout_secs(delay_ms) <= MAX_VISIBILITY_TIMEOUT_SECS);
            }
        }
    }
}
