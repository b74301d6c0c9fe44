//! Poll timing policy: overall budget, inter-attempt delay, optional backoff.
//!
//! Control-plane state usually flips within seconds, so the default is a
//! short fixed interval. Long-running provider-side work (image copies,
//! batch jobs) gets a wider interval and a much larger budget. Backoff is
//! opt-in: the factor defaults to 1, which keeps the interval fixed.

use std::time::Duration;

use thiserror::Error;

/// Interval appropriate for fast control-plane state polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interval appropriate for long-running provider-side jobs.
pub const LONG_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timing policy for one convergence wait.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Overall deadline measured from the first attempt. A zero budget
    /// performs exactly one attempt.
    pub timeout: Duration,

    /// Delay before the first re-check.
    pub initial_delay: Duration,

    /// Upper bound on the inter-attempt delay.
    pub delay_cap: Duration,

    /// Multiplier applied to the delay after each non-terminal attempt.
    /// 1 means fixed-interval polling.
    pub backoff_factor: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(60), DEFAULT_POLL_INTERVAL)
    }
}

impl PollPolicy {
    /// Fixed-interval polling: the same delay between every attempt.
    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            initial_delay: interval,
            delay_cap: interval,
            backoff_factor: 1.0,
        }
    }

    /// Growing delays: start at `initial_delay`, multiply by `factor` after
    /// each attempt, never exceed `delay_cap`.
    pub fn with_backoff(
        timeout: Duration,
        initial_delay: Duration,
        delay_cap: Duration,
        factor: f64,
    ) -> Self {
        Self {
            timeout,
            initial_delay,
            delay_cap,
            backoff_factor: factor,
        }
    }

    /// Check the policy invariants.
    ///
    /// The engine itself is total over any policy (delays are clamped, a
    /// zero budget means one attempt); this is for call sites that accept
    /// policies from configuration and want to reject nonsense early.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.timeout.is_zero() {
            return Err(PolicyError::ZeroTimeout);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(PolicyError::BackoffFactor(self.backoff_factor));
        }
        if self.initial_delay > self.delay_cap {
            return Err(PolicyError::DelayAboveCap {
                initial_delay: self.initial_delay,
                delay_cap: self.delay_cap,
            });
        }
        Ok(())
    }

    /// The sequence of inter-attempt delays this policy produces.
    pub fn schedule(&self) -> DelaySchedule {
        DelaySchedule {
            next: self.initial_delay,
            cap: self.delay_cap,
            factor: self.backoff_factor,
        }
    }
}

/// Policy invariant violations.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    /// The budget must be positive.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// The backoff factor must be finite and at least 1.
    #[error("backoff factor {0} must be finite and >= 1")]
    BackoffFactor(f64),

    /// The initial delay must not exceed the cap.
    #[error("initial delay {initial_delay:?} exceeds delay cap {delay_cap:?}")]
    DelayAboveCap {
        initial_delay: Duration,
        delay_cap: Duration,
    },
}

/// Sequence of inter-attempt delays produced by a [`PollPolicy`].
///
/// Delays are clamped to the cap, and factors below 1 behave as 1, so the
/// sequence is total even over an invalid policy.
#[derive(Debug, Clone)]
pub struct DelaySchedule {
    next: Duration,
    cap: Duration,
    factor: f64,
}

impl DelaySchedule {
    /// The delay to sleep before the next attempt, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next.min(self.cap);
        if self.factor > 1.0 {
            let scaled = Duration::try_from_secs_f64(current.as_secs_f64() * self.factor)
                .unwrap_or(self.cap);
            self.next = scaled.min(self.cap);
        } else {
            self.next = current;
        }
        current
    }
}

/// Wait budgets for common operation classes.
///
/// An instance reaches running within minutes; tearing one down is near
/// immediate; copying an image can take the better part of an hour. Each
/// budget can be overridden with a `STRATUS_TIMEOUT_*` environment variable
/// holding whole seconds; absent or unparsable values fall back to the
/// default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Budget for an instance to reach its running state.
    pub instance_running: Duration,

    /// Budget for an instance to terminate and disappear.
    pub instance_terminated: Duration,

    /// Budget for a provider-side job to finish.
    pub job_complete: Duration,

    /// Budget for an image to become available.
    pub image_available: Duration,

    /// Budget for a service port to accept connections.
    pub port_open: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            instance_running: Duration::from_secs(1200),
            instance_terminated: Duration::from_secs(30),
            job_complete: Duration::from_secs(600),
            image_available: Duration::from_secs(3600),
            port_open: Duration::from_secs(600),
        }
    }
}

impl Timeouts {
    /// Load budgets from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            instance_running: env_secs(
                "STRATUS_TIMEOUT_INSTANCE_RUNNING",
                defaults.instance_running,
            ),
            instance_terminated: env_secs(
                "STRATUS_TIMEOUT_INSTANCE_TERMINATED",
                defaults.instance_terminated,
            ),
            job_complete: env_secs("STRATUS_TIMEOUT_JOB_COMPLETE", defaults.job_complete),
            image_available: env_secs("STRATUS_TIMEOUT_IMAGE_AVAILABLE", defaults.image_available),
            port_open: env_secs("STRATUS_TIMEOUT_PORT_OPEN", defaults.port_open),
        }
    }
}

fn env_secs(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
