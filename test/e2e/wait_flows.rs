//! End-to-end wait flows against a fake cloud.
//!
//! Exercises the public convergence surface the way a provisioning
//! workflow uses it:
//!
//! 1. Boot an instance and wait until it is running.
//! 2. Delete it and wait until the record is gone.
//! 3. Run independent waits concurrently.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p stratus-e2e --test wait_flows
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use stratus_converge::{
    converge_until_gone, converge_until_ready, Classification, ConvergeError, Fetched, PollPolicy,
    StateReader,
};
use thiserror::Error;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Instance lifecycle states as a provider reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
    Provisioning,
    Running,
    Error,
    Terminating,
}

#[derive(Debug, Error)]
#[error("cloud api unreachable")]
struct CloudUnreachable;

/// In-memory provider. Each instance carries the sequence of states that
/// successive control-plane reads will observe; `None` marks the point
/// where the record disappears. The final entry repeats once reached, the
/// way a settled remote system keeps answering the same thing.
struct FakeCloud {
    instances: Mutex<HashMap<String, VecDeque<Option<InstanceState>>>>,
}

impl FakeCloud {
    fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register an instance with the lifecycle its reads will observe.
    fn boot(&self, id: &str, lifecycle: impl IntoIterator<Item = InstanceState>) {
        let seq = lifecycle.into_iter().map(Some).collect();
        self.instances.lock().unwrap().insert(id.to_string(), seq);
    }

    /// Replace the lifecycle with an asynchronous teardown: the instance
    /// lingers in Terminating for a few reads, then the record disappears.
    fn delete(&self, id: &str, drain_reads: usize) {
        let mut seq: VecDeque<_> = std::iter::repeat(Some(InstanceState::Terminating))
            .take(drain_reads)
            .collect();
        seq.push_back(None);
        self.instances.lock().unwrap().insert(id.to_string(), seq);
    }
}

#[async_trait]
impl StateReader<str> for FakeCloud {
    type Snapshot = InstanceState;
    type Error = CloudUnreachable;

    async fn fetch(&self, handle: &str) -> Result<Fetched<InstanceState>, CloudUnreachable> {
        let mut instances = self.instances.lock().unwrap();
        let Some(seq) = instances.get_mut(handle) else {
            return Ok(Fetched::Absent);
        };
        let observed = if seq.len() > 1 {
            seq.pop_front().unwrap()
        } else {
            *seq.front().unwrap()
        };
        Ok(match observed {
            Some(state) => Fetched::Snapshot(state),
            None => Fetched::Absent,
        })
    }
}

fn running(state: &InstanceState) -> Classification {
    match state {
        InstanceState::Running => Classification::Succeeded,
        InstanceState::Error => Classification::failed("instance entered error state"),
        _ => Classification::Pending,
    }
}

fn draining(state: &InstanceState) -> Classification {
    match state {
        InstanceState::Error => Classification::failed("teardown reported error state"),
        _ => Classification::Pending,
    }
}

fn fast_policy() -> PollPolicy {
    PollPolicy::fixed(Duration::from_secs(60), Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_boot_then_delete_flow() {
    init_tracing();
    let cloud = FakeCloud::new();
    cloud.boot(
        "inst-1",
        [
            InstanceState::Provisioning,
            InstanceState::Provisioning,
            InstanceState::Running,
        ],
    );

    let booted = converge_until_ready(&cloud, "inst-1", running, &fast_policy(), None)
        .await
        .unwrap();
    assert_eq!(booted.snapshot, Some(InstanceState::Running));
    assert_eq!(booted.attempts, 3);
    tracing::info!(attempts = booted.attempts, "instance running");

    cloud.delete("inst-1", 2);

    let gone = converge_until_gone(&cloud, "inst-1", draining, &fast_policy(), None)
        .await
        .unwrap();
    assert_eq!(gone.snapshot, None);
    assert_eq!(gone.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_boot_surfaces_provider_reason() {
    init_tracing();
    let cloud = FakeCloud::new();
    cloud.boot(
        "inst-2",
        [InstanceState::Provisioning, InstanceState::Error],
    );

    let err = converge_until_ready(&cloud, "inst-2", running, &fast_policy(), None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, ConvergeError::OperationFailed { ref reason } if reason == "instance entered error state"),
        "got {err:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_ready_wait_on_missing_instance_is_terminal() {
    init_tracing();
    let cloud = FakeCloud::new();

    let err = converge_until_ready(&cloud, "inst-missing", running, &fast_policy(), None)
        .await
        .unwrap_err();

    assert!(err.is_operation_failure(), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waits_are_independent() {
    init_tracing();
    let cloud = FakeCloud::new();
    cloud.boot(
        "inst-a",
        [InstanceState::Provisioning, InstanceState::Running],
    );
    cloud.boot(
        "inst-b",
        [
            InstanceState::Provisioning,
            InstanceState::Provisioning,
            InstanceState::Provisioning,
            InstanceState::Running,
        ],
    );

    let policy = fast_policy();
    let (a, b) = tokio::join!(
        converge_until_ready(&cloud, "inst-a", running, &policy, None),
        converge_until_ready(&cloud, "inst-b", running, &policy, None),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.snapshot, Some(InstanceState::Running));
    assert_eq!(b.snapshot, Some(InstanceState::Running));
    assert_eq!(a.attempts, 2);
    assert_eq!(b.attempts, 4);
}
