//! State readers: one round trip to authoritative remote state.
//!
//! Absence is explicit. A reader returns [`Fetched::Absent`] when the
//! remote system reports that the resource does not exist, and reserves
//! `Err` for transport faults (network, auth, malformed response). A
//! null-like sentinel standing in for "gone" is not an option here; whether
//! a vanished resource is good or bad news is decided by the wait, not
//! smuggled through the reader.
//!
//! A scripted implementation is provided for testing and development.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result of one read of remote state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// The resource exists; here is its current state.
    Snapshot(T),

    /// The remote system reports no such resource.
    Absent,
}

impl<T> Fetched<T> {
    /// Returns true when the remote system reported not-found.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The snapshot, if the resource exists.
    pub fn snapshot(&self) -> Option<&T> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot),
            Self::Absent => None,
        }
    }
}

/// One round trip to the remote system for the current state of a resource.
///
/// Implementations are provider-specific glue (HTTP, XML, auth signing) and
/// live outside this crate. The engine only requires that a read either
/// yields a snapshot, reports absence explicitly, or fails with a transport
/// error.
#[async_trait]
pub trait StateReader<H: ?Sized>: Send + Sync {
    /// State returned by a successful read.
    type Snapshot: Send;

    /// Transport-level failure (network, auth, malformed response).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Re-fetch the current state of the resource behind `handle`.
    async fn fetch(&self, handle: &H) -> Result<Fetched<Self::Snapshot>, Self::Error>;
}

/// One step in a scripted reader.
#[derive(Debug, Clone)]
pub enum ScriptStep<T> {
    /// Return this snapshot.
    Snapshot(T),

    /// Report the resource as not found.
    Absent,

    /// Fail the read with a transport error.
    Fail(String),
}

/// Transport error produced by a scripted reader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("scripted read failure: {0}")]
pub struct ScriptedError(pub String);

/// Scripted reader for testing and development.
///
/// Replays its steps in order, one per fetch; the final step repeats once
/// the script is exhausted, so a short script can stand in for a remote
/// system that has settled. An optional per-fetch latency simulates a slow
/// remote read.
pub struct ScriptedReader<T> {
    steps: Mutex<VecDeque<ScriptStep<T>>>,
    latency: Duration,
    fetches: AtomicU32,
}

impl<T> ScriptedReader<T> {
    /// Create a reader that replays `steps`.
    ///
    /// # Panics
    ///
    /// Panics if `steps` is empty.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep<T>>) -> Self {
        let steps: VecDeque<_> = steps.into_iter().collect();
        assert!(!steps.is_empty(), "script must have at least one step");
        Self {
            steps: Mutex::new(steps),
            latency: Duration::ZERO,
            fetches: AtomicU32::new(0),
        }
    }

    /// Create a reader that returns the same step forever.
    pub fn always(step: ScriptStep<T>) -> Self {
        Self::new([step])
    }

    /// Add a fixed latency to every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<H, T> StateReader<H> for ScriptedReader<T>
where
    H: ?Sized + Sync,
    T: Clone + Send + Sync,
{
    type Snapshot = T;
    type Error = ScriptedError;

    async fn fetch(&self, _handle: &H) -> Result<Fetched<T>, ScriptedError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let step = {
            let mut steps = self.steps.lock().expect("script lock poisoned");
            if steps.len() > 1 {
                steps.pop_front().expect("script is never empty")
            } else {
                steps.front().cloned().expect("script is never empty")
            }
        };
        match step {
            ScriptStep::Snapshot(snapshot) => Ok(Fetched::Snapshot(snapshot)),
            ScriptStep::Absent => Ok(Fetched::Absent),
            ScriptStep::Fail(reason) => Err(ScriptedError(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_accessors() {
        let present = Fetched::Snapshot("running");
        assert!(!present.is_absent());
        assert_eq!(present.snapshot(), Some(&"running"));

        let gone: Fetched<&str> = Fetched::Absent;
        assert!(gone.is_absent());
        assert_eq!(gone.snapshot(), None);
    }

    #[tokio::test]
    async fn test_script_replays_in_order_and_repeats_final_step() {
        let reader = ScriptedReader::new([
            ScriptStep::Snapshot("provisioning"),
            ScriptStep::Absent,
            ScriptStep::Snapshot("running"),
        ]);

        assert_eq!(
            reader.fetch("inst-1").await,
            Ok(Fetched::Snapshot("provisioning"))
        );
        assert_eq!(reader.fetch("inst-1").await, Ok(Fetched::Absent));
        assert_eq!(reader.fetch("inst-1").await, Ok(Fetched::Snapshot("running")));
        // Script exhausted: the final step repeats.
        assert_eq!(reader.fetch("inst-1").await, Ok(Fetched::Snapshot("running")));
        assert_eq!(reader.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_scripted_failure_surfaces_as_transport_error() {
        let reader: ScriptedReader<&str> =
            ScriptedReader::always(ScriptStep::Fail("connection reset".to_string()));
        let err = reader.fetch("inst-1").await.unwrap_err();
        assert_eq!(err, ScriptedError("connection reset".to_string()));
    }
}
