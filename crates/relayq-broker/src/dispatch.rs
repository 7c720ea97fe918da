// SPDX-License-Identifier: MIT OR Apache-2.0
//! The shared admission, handler dispatch, and disposition logic.
//!
//! Both adapters funnel every received message through [`dispatch`] and map
//! the resulting [`HandlerOutcome`] to a broker call via [`decide`]. This is
//! where the runtime's dispatch invariants live:
//!
//! 1. A duplicate delivery (dedup gate refuses admission) is dropped from
//!    the broker without a handler call; the iteration still counts as
//!    having received a message.
//! 2. A handler error is rejected for retry subject to policy and reported
//!    through `on_error`.
//! 3. A handler abort is rejected for retry subject to policy without an
//!    `on_error` report.
//! 4. Exactly one disposition is issued per admitted message; the adapters
//!    translate the decision into their broker's ack/reject/delay calls.

use crate::adapter::MessageHandler;
use crate::context::WorkerContext;
use relayq_core::{Message, WorkerError};
use relayq_retry::RetryPolicy;
use tracing::debug;

/// How the handler left an admitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Handler returned normally without requesting abort.
    Completed,
    /// Handler returned normally but set the abort flag.
    Aborted,
    /// Handler returned an error (already reported through `on_error`).
    Failed,
}

impl HandlerOutcome {
    /// The abort flag to hand to `on_retry`: whether the handler asked for
    /// the rejection rather than failing.
    #[must_use]
    pub fn abort_flag(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// The broker call an outcome maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message permanently; processing succeeded.
    Ack,
    /// Reject and reschedule with a backoff delay.
    Retry,
    /// The delivery count reached the maximum: remove permanently and
    /// report through `on_retry_exceeded`.
    Exceeded,
    /// Retries are disabled and the budget is not exhausted: the message is
    /// rejected from the queue with no reschedule and no callback.
    Drop,
}

/// Admit `message` and run the handler.
///
/// Returns `None` when the dedup gate refused admission (the caller drops
/// the message from the broker and reports the iteration as received), or
/// the [`HandlerOutcome`] otherwise. Handler errors are reported through
/// the context before this returns.
pub async fn dispatch(
    ctx: &WorkerContext,
    message: &Message,
    handler: &dyn MessageHandler,
) -> Option<HandlerOutcome> {
    if !ctx.nonce().admit(&message.id) {
        ctx.metrics().record_duplicate();
        debug!(
            target: "relayq.broker",
            message_id = %message.id,
            "duplicate delivery dropped without dispatch"
        );
        return None;
    }

    ctx.metrics().record_handled();
    let mut args = message.args();
    let outcome = match handler.handle(&message.content, &mut args).await {
        Ok(()) if args.abort => {
            ctx.nonce().failed(&message.id);
            HandlerOutcome::Aborted
        }
        Ok(()) => {
            ctx.nonce().complete(&message.id);
            HandlerOutcome::Completed
        }
        Err(source) => {
            ctx.nonce().failed(&message.id);
            ctx.report_error(
                &WorkerError::Handler {
                    id: message.id.clone(),
                    source,
                },
                Some(message),
            );
            HandlerOutcome::Failed
        }
    };
    Some(outcome)
}

/// Map a handler outcome onto a broker disposition.
///
/// `attempts` is the delivery counter the broker model treats as
/// authoritative, before any increment: exhaustion is judged against the
/// policy's maximum, and only then does `allow_retry` gate rescheduling.
#[must_use]
pub fn decide(policy: &RetryPolicy, outcome: HandlerOutcome, attempts: u32) -> Disposition {
    match outcome {
        HandlerOutcome::Completed => Disposition::Ack,
        HandlerOutcome::Aborted | HandlerOutcome::Failed => {
            if policy.is_exhausted(attempts) {
                Disposition::Exceeded
            } else if policy.allow_retry {
                Disposition::Retry
            } else {
                Disposition::Drop
            }
        }
    }
}
