//! Retransmission timers and the policy that spaces them.
//!
//! Every pending frame has exactly one armed timer. A timer is a small tokio
//! task that sleeps for the policy delay and then posts a `RetryExpired`
//! message to the owning client's event loop; it never touches the pending
//! table itself. Each arm gets a fresh generation number so the loop can tell
//! a current expiry from one that was already queued when its frame was
//! acknowledged or re-armed.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::frame::FrameId;

/// Default delay before the first retransmission: 3 seconds.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Default ceiling for backed-off delays: 60 seconds.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How long to wait between retransmissions and when to give up.
///
/// The default is a fixed 3 s delay with no attempt cap: a frame is resent
/// until it is acknowledged or its client is torn down.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retransmission.
    pub delay: Duration,
    /// Multiplier applied per retransmission. `1.0` keeps the delay fixed.
    pub backoff: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Retransmissions allowed before the frame is dropped. `None` retries
    /// forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Fixed delay, unbounded attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Exponential backoff starting at `delay`, doubling up to `max_delay`.
    pub fn exponential(delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay,
            backoff: 2.0,
            max_delay,
            max_attempts: None,
        }
    }

    /// Builder-style attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before the timer armed after `attempt` retransmissions fires.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether a frame that has been retransmitted `attempts` times must be
    /// given up instead of resent again.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            backoff: 1.0,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

/// Message posted to the event loop when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExpired {
    pub frame_id: FrameId,
    pub generation: u64,
}

/// Handle to one armed timer.
///
/// Dropping the handle does not stop the timer; call `cancel()`.
#[derive(Debug)]
pub struct RetryHandle {
    generation: u64,
    abort: AbortHandle,
}

impl RetryHandle {
    /// Generation stamped on the expiry this timer will post.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Prevent the timer from firing. No-op if it already fired.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether the timer task has completed (fired or cancelled).
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Arms single-shot retransmission timers for one client instance.
///
/// Must be used from within a tokio runtime.
pub struct RetryScheduler {
    policy: RetryPolicy,
    expiries: mpsc::UnboundedSender<RetryExpired>,
    next_generation: u64,
}

impl RetryScheduler {
    /// Create a scheduler and the receiver its expiries are delivered on.
    pub fn new(policy: RetryPolicy) -> (Self, mpsc::UnboundedReceiver<RetryExpired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            policy,
            expiries: tx,
            next_generation: 0,
        };
        (scheduler, rx)
    }

    /// Arm a timer for `frame_id` that has already been retransmitted
    /// `attempt` times.
    pub fn arm(&mut self, frame_id: FrameId, attempt: u32) -> RetryHandle {
        let delay = self.policy.delay_for(attempt);
        let generation = self.next_generation;
        self.next_generation += 1;

        let tx = self.expiries.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The loop may already be gone after teardown.
            let _ = tx.send(RetryExpired {
                frame_id,
                generation,
            });
        });
        trace!(frame_id, generation, ?delay, "retry timer armed");

        RetryHandle {
            generation,
            abort: task.abort_handle(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
