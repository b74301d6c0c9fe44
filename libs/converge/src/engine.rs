//! The convergence engine: fetch, classify, repeat until terminal.
//!
//! [`converge`] is the single entry point. It adapts a typed fetch-and-
//! classify pair into the boolean check the bounded-retry driver consumes,
//! and owns the rule that a terminal failure raises a typed error
//! immediately instead of burning the rest of the budget.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classify::{Classification, VanishedMeans};
use crate::error::{ConvergeError, Observed};
use crate::policy::PollPolicy;
use crate::reader::{Fetched, StateReader};
use crate::retry::{self, Probe, RetryOutcome};

/// Successful convergence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converged<T> {
    /// Final snapshot. `None` when the wait succeeded because the resource
    /// vanished, so there is no state left to report.
    pub snapshot: Option<T>,

    /// Fetches performed, including the terminal one.
    pub attempts: u32,

    /// Wall-clock time from the first fetch.
    pub elapsed: Duration,
}

/// Adapts fetch-and-classify into the check shape the retry driver drives.
///
/// Holds the terminal snapshot and the last non-terminal observation, so
/// the engine can hand back the final state on success and name what it
/// last saw when a wait times out.
pub struct ConvergencePredicate<'a, H, R, C>
where
    H: ?Sized,
    R: StateReader<H>,
{
    reader: &'a R,
    handle: &'a H,
    classify: C,
    vanished: VanishedMeans,
    snapshot: Option<R::Snapshot>,
    last_observed: Option<Observed>,
}

impl<'a, H, R, C> ConvergencePredicate<'a, H, R, C>
where
    H: ?Sized,
    R: StateReader<H>,
    C: FnMut(&R::Snapshot) -> Classification,
{
    /// Build a predicate polling `handle` through `reader`.
    pub fn new(reader: &'a R, handle: &'a H, classify: C, vanished: VanishedMeans) -> Self {
        Self {
            reader,
            handle,
            classify,
            vanished,
            snapshot: None,
            last_observed: None,
        }
    }

    /// Last non-terminal observation, if any attempt completed one.
    pub fn last_observed(&self) -> Option<Observed> {
        self.last_observed
    }

    /// Take the terminal snapshot out of the predicate.
    pub fn into_snapshot(self) -> Option<R::Snapshot> {
        self.snapshot
    }

    fn resolve_vanished(&mut self) -> Result<bool, ConvergeError> {
        match self.vanished {
            VanishedMeans::Success => {
                self.snapshot = None;
                Ok(true)
            }
            VanishedMeans::Failure => Err(ConvergeError::OperationFailed {
                reason: "resource not found".to_string(),
            }),
            VanishedMeans::Pending => {
                self.last_observed = Some(Observed::Absent);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl<'a, H, R, C> Probe for ConvergencePredicate<'a, H, R, C>
where
    H: ?Sized + Sync,
    R: StateReader<H>,
    C: FnMut(&R::Snapshot) -> Classification + Send,
{
    type Error = ConvergeError;

    async fn probe(&mut self) -> Result<bool, ConvergeError> {
        let fetched = match self.reader.fetch(self.handle).await {
            Ok(fetched) => fetched,
            Err(source) => {
                return Err(ConvergeError::Transport {
                    source: Box::new(source),
                })
            }
        };
        match fetched {
            Fetched::Absent => self.resolve_vanished(),
            Fetched::Snapshot(snapshot) => match (self.classify)(&snapshot) {
                Classification::Succeeded => {
                    self.snapshot = Some(snapshot);
                    Ok(true)
                }
                Classification::Failed { reason } => {
                    Err(ConvergeError::OperationFailed { reason })
                }
                Classification::Pending => {
                    self.last_observed = Some(Observed::Pending);
                    Ok(false)
                }
                Classification::Vanished => self.resolve_vanished(),
            },
        }
    }
}

/// Poll `handle` through `reader` until the classifier reports a terminal
/// verdict, the budget lapses, or the caller cancels.
///
/// Every attempt is one fetch followed by one classification. A transport
/// error or a `Failed` verdict aborts the wait immediately, even on an
/// attempt that completes after the deadline: a just-arrived terminal
/// result is more informative than a budget artifact.
pub async fn converge<H, R, C>(
    reader: &R,
    handle: &H,
    classify: C,
    vanished: VanishedMeans,
    policy: &PollPolicy,
    cancel: Option<&CancellationToken>,
) -> Result<Converged<R::Snapshot>, ConvergeError>
where
    H: ?Sized + Sync,
    R: StateReader<H>,
    C: FnMut(&R::Snapshot) -> Classification + Send,
{
    let mut predicate = ConvergencePredicate::new(reader, handle, classify, vanished);
    match retry::run_bounded(&mut predicate, policy, cancel).await? {
        RetryOutcome::Satisfied { attempts, elapsed } => {
            debug!(
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "converged"
            );
            Ok(Converged {
                snapshot: predicate.into_snapshot(),
                attempts,
                elapsed,
            })
        }
        RetryOutcome::Exhausted { attempts, elapsed } => Err(ConvergeError::TimedOut {
            elapsed,
            attempts,
            last_observed: predicate.last_observed(),
        }),
        RetryOutcome::Cancelled { .. } => Err(ConvergeError::Cancelled),
    }
}

/// Wait for a resource to be gone.
///
/// Vanishing is the target state, so a not-found read ends the wait
/// successfully. The classifier still sees every snapshot observed on the
/// way out and may fail the wait if teardown reports an error state.
pub async fn converge_until_gone<H, R, C>(
    reader: &R,
    handle: &H,
    classify: C,
    policy: &PollPolicy,
    cancel: Option<&CancellationToken>,
) -> Result<Converged<R::Snapshot>, ConvergeError>
where
    H: ?Sized + Sync,
    R: StateReader<H>,
    C: FnMut(&R::Snapshot) -> Classification + Send,
{
    converge(reader, handle, classify, VanishedMeans::Success, policy, cancel).await
}

/// Wait for a resource to reach a state it can only reach while it exists.
///
/// A not-found read is a terminal fault, not a reason to keep polling.
pub async fn converge_until_ready<H, R, C>(
    reader: &R,
    handle: &H,
    classify: C,
    policy: &PollPolicy,
    cancel: Option<&CancellationToken>,
) -> Result<Converged<R::Snapshot>, ConvergeError>
where
    H: ?Sized + Sync,
    R: StateReader<H>,
    C: FnMut(&R::Snapshot) -> Classification + Send,
{
    converge(reader, handle, classify, VanishedMeans::Failure, policy, cancel).await
}
