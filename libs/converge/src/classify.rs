//! Resource state classification.
//!
//! One poll of remote state produces a four-way verdict: the operation is
//! still in progress, reached its target state, reached a terminal
//! non-target state, or the resource no longer exists. What a vanished
//! resource means is not fixed here: a deletion wait treats it as success
//! while an existence wait treats it as pending or failure, so the caller
//! supplies that interpretation per wait.

use serde::{Deserialize, Serialize};

/// Verdict derived from one snapshot of remote state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Classification {
    /// Operation still in progress; poll again.
    Pending,

    /// Operation reached its target terminal state.
    Succeeded,

    /// Operation reached a terminal non-target state.
    Failed {
        /// Provider-reported reason, surfaced verbatim.
        reason: String,
    },

    /// The resource no longer exists.
    Vanished,
}

impl Classification {
    /// Build a `Failed` verdict from a provider-reported reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns true if this verdict ends the wait regardless of budget.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }

    /// Returns true if the operation is still in progress.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Caller-supplied interpretation of a vanished resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VanishedMeans {
    /// The wait is over and succeeded. Used by deletion waits, where
    /// not-found is the target state.
    Success,

    /// Keep polling. Used when the resource may simply not be visible yet.
    Pending,

    /// Terminal fault: the resource was required to exist.
    Failure,
}
