//! Bounded retry: drive a boolean check under a time budget.
//!
//! The driver knows nothing about resources. It owns the schedule only:
//! invoke the check, stop on true, give up when the budget lapses, sleep
//! between attempts, and bail out promptly when the caller cancels. A check
//! that errs is never retried; the error propagates at once.
//!
//! Time is measured with `tokio::time::Instant`, so the tokio paused clock
//! governs the driver deterministically in tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::policy::PollPolicy;

/// One retryable check.
///
/// `Ok(true)` ends the retry loop, `Ok(false)` means not yet, and `Err`
/// aborts the loop immediately. Attempts are strictly sequential: the
/// driver never runs two checks concurrently.
#[async_trait]
pub trait Probe: Send {
    /// Terminal error raised by the check.
    type Error: Send;

    /// Run one attempt.
    async fn probe(&mut self) -> Result<bool, Self::Error>;
}

/// Adapter turning a closure into a [`Probe`]. Built by [`probe_fn`].
pub struct FnProbe<F>(F);

/// Wrap a future-returning closure so the retry driver can poll it.
pub fn probe_fn<F, Fut, E>(f: F) -> FnProbe<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool, E>> + Send,
    E: Send,
{
    FnProbe(f)
}

#[async_trait]
impl<F, Fut, E> Probe for FnProbe<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool, E>> + Send,
    E: Send,
{
    type Error = E;

    async fn probe(&mut self) -> Result<bool, E> {
        (self.0)().await
    }
}

/// How a bounded retry run ended, short of a check error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The check returned true within budget.
    Satisfied {
        /// Attempts performed, including the one that returned true.
        attempts: u32,
        /// Wall-clock time from the first attempt.
        elapsed: Duration,
    },

    /// The budget lapsed with the check still returning false.
    Exhausted {
        /// Attempts performed before giving up.
        attempts: u32,
        /// Wall-clock time from the first attempt.
        elapsed: Duration,
    },

    /// The caller cancelled the wait.
    Cancelled {
        /// Attempts completed before cancellation.
        attempts: u32,
        /// Wall-clock time from the first attempt.
        elapsed: Duration,
    },
}

impl RetryOutcome {
    /// Returns true if the check converged within budget.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Attempts performed before the run ended.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Satisfied { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Drive `probe` until it returns true, the budget lapses, or `cancel` fires.
///
/// The deadline is soft: it is checked after each attempt and again after
/// each sleep, never mid-attempt. An attempt in flight when the deadline
/// passes runs to completion and its result wins over the budget. A zero
/// budget performs exactly one attempt and never sleeps. Cancellation is
/// checked before each attempt and interrupts a sleep promptly; it is
/// reported as its own outcome, never conflated with exhaustion.
pub async fn run_bounded<P: Probe>(
    probe: &mut P,
    policy: &PollPolicy,
    cancel: Option<&CancellationToken>,
) -> Result<RetryOutcome, P::Error> {
    let start = Instant::now();
    let mut schedule = policy.schedule();
    let mut attempts: u32 = 0;

    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                debug!(attempts, "wait cancelled before next attempt");
                return Ok(RetryOutcome::Cancelled {
                    attempts,
                    elapsed: start.elapsed(),
                });
            }
        }

        attempts += 1;
        trace!(attempt = attempts, "running check");
        if probe.probe().await? {
            debug!(
                attempts,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "check satisfied"
            );
            return Ok(RetryOutcome::Satisfied {
                attempts,
                elapsed: start.elapsed(),
            });
        }

        if start.elapsed() >= policy.timeout {
            warn!(
                attempts,
                timeout_ms = policy.timeout.as_millis() as u64,
                "budget exhausted"
            );
            return Ok(RetryOutcome::Exhausted {
                attempts,
                elapsed: start.elapsed(),
            });
        }

        let delay = schedule.next_delay();
        trace!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "check not satisfied, sleeping"
        );
        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(attempts, "wait cancelled during sleep");
                        return Ok(RetryOutcome::Cancelled {
                            attempts,
                            elapsed: start.elapsed(),
                        });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }

        // Deadline boundary before the next attempt: a budget that lapsed
        // during the sleep does not buy one more check.
        if start.elapsed() >= policy.timeout {
            warn!(
                attempts,
                timeout_ms = policy.timeout.as_millis() as u64,
                "budget exhausted"
            );
            return Ok(RetryOutcome::Exhausted {
                attempts,
                elapsed: start.elapsed(),
            });
        }
    }
}
