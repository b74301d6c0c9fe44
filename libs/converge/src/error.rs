//! Typed failures for convergence waits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Last non-terminal observation before a wait gave up.
///
/// Only the non-terminal observations can precede a timeout; a succeeded or
/// failed verdict would have ended the wait on the spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observed {
    /// The resource existed and classified as still in progress.
    Pending,

    /// The resource was not found.
    Absent,
}

/// Errors surfaced by a convergence wait.
///
/// A timeout is a caller/budget problem, an operation failure is a
/// remote-system-reported fault, a transport error is a plumbing problem,
/// and a cancellation is a caller decision. Each calls for different
/// remediation, so none is ever folded into another.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// The remote system reported a terminal non-target state.
    #[error("operation failed: {reason}")]
    OperationFailed {
        /// Provider-reported reason, verbatim.
        reason: String,
    },

    /// The state reader itself failed (network, auth, malformed response).
    ///
    /// Never retried here; retry of transient transport faults belongs to
    /// the transport layer.
    #[error("state read failed: {source}")]
    Transport {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The budget elapsed while classification remained non-terminal.
    #[error("timed out after {elapsed:?} ({attempts} attempts)")]
    TimedOut {
        /// Wall-clock time from the first attempt.
        elapsed: Duration,
        /// Attempts performed before giving up.
        attempts: u32,
        /// What the final completed attempt saw, to aid diagnosis of a
        /// stalled wait.
        last_observed: Option<Observed>,
    },

    /// The caller aborted the wait.
    #[error("wait cancelled")]
    Cancelled,
}

impl ConvergeError {
    /// Returns true if the remote system reported a terminal failure.
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }

    /// Returns true if the wait budget ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Returns true if the caller cancelled the wait.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
