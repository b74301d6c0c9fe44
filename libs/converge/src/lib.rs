//! # stratus-converge
//!
//! Convergence engine for asynchronous cloud control-plane operations.
//!
//! A control-plane call that boots a VM, runs a provider-side job, or
//! deletes an instance returns before the work is done; completion is
//! discovered by re-reading authoritative state until it reaches a
//! terminal condition. This crate is the one place that loop lives:
//!
//! - [`StateReader`] performs one read of remote state, reporting absence
//!   explicitly as [`Fetched::Absent`].
//! - A classifier maps each snapshot to a [`Classification`].
//! - [`PollPolicy`] bounds the wait and spaces the attempts.
//! - [`converge`] drives the loop to a [`Converged`] value or a typed
//!   [`ConvergeError`].
//!
//! ## Design Principles
//!
//! - Terminal failures are never retried; remote state does not self-correct.
//! - Transport faults surface immediately; retry of transient transport
//!   errors belongs to the transport layer, so the two loops never compound.
//! - Absence is explicit, and what it means is chosen per wait
//!   ([`VanishedMeans`]): a deletion wait treats vanished as success, an
//!   existence wait as pending or failure.
//! - Cancellation is prompt and reported distinctly from timeout.
//! - Attempts on one handle are strictly sequential; waits on different
//!   handles are fully independent.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use stratus_converge::{
//!     converge, Classification, PollPolicy, ScriptStep, ScriptedReader, VanishedMeans,
//! };
//!
//! # async fn demo() -> Result<(), stratus_converge::ConvergeError> {
//! let reader = ScriptedReader::new([
//!     ScriptStep::Snapshot("provisioning".to_string()),
//!     ScriptStep::Snapshot("running".to_string()),
//! ]);
//! let policy = PollPolicy::fixed(Duration::from_secs(60), Duration::from_secs(1));
//!
//! let outcome = converge(
//!     &reader,
//!     "inst-42",
//!     |state: &String| {
//!         if state == "running" {
//!             Classification::Succeeded
//!         } else {
//!             Classification::Pending
//!         }
//!     },
//!     VanishedMeans::Pending,
//!     &policy,
//!     None,
//! )
//! .await?;
//!
//! assert_eq!(outcome.snapshot.as_deref(), Some("running"));
//! # Ok(())
//! # }
//! ```

mod classify;
mod engine;
mod error;
mod policy;
mod reader;
mod retry;

pub use classify::{Classification, VanishedMeans};
pub use engine::{
    converge, converge_until_gone, converge_until_ready, Converged, ConvergencePredicate,
};
pub use error::{ConvergeError, Observed};
pub use policy::{
    DelaySchedule, PolicyError, PollPolicy, Timeouts, DEFAULT_POLL_INTERVAL, LONG_POLL_INTERVAL,
};
pub use reader::{Fetched, ScriptStep, ScriptedError, ScriptedReader, StateReader};
pub use retry::{probe_fn, run_bounded, FnProbe, Probe, RetryOutcome};

/// Re-export so downstreams wait with the same cancellation token type.
pub use tokio_util::sync::CancellationToken;
