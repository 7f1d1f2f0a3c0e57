//! Circuit breaker state for one dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a bounded number of probe calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: rolling failure ratio >= threshold after retries are exhausted
//! Open → Half-Open: reset timeout elapsed (checked lazily on the next call)
//! Half-Open → Closed: a probe succeeds
//! Half-Open → Open: a probe fails
//! ```
//!
//! `CircuitState` is plain data: every method takes `&mut self` and the
//! caller (see `registry.rs`) holds the per-circuit lock around it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use crate::resilience::policy::CallPolicy;

/// Circuit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding used by the state gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            CircuitStatus::Closed => 0.0,
            CircuitStatus::HalfOpen => 1.0,
            CircuitStatus::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one call as seen by the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Size of the rolling window and the sample floor below which the failure
/// ratio is not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub size: usize,
    pub min_samples: usize,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            size: 50,
            min_samples: 5,
        }
    }
}

/// Fixed-count window of recent outcomes; oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    outcomes: VecDeque<Outcome>,
    capacity: usize,
    failures: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            failures: 0,
        }
    }

    pub fn push(&mut self, outcome: Outcome) {
        if self.outcomes.len() == self.capacity {
            if let Some(Outcome::Failure) = self.outcomes.pop_front() {
                self.failures -= 1;
            }
        }
        if outcome == Outcome::Failure {
            self.failures += 1;
        }
        self.outcomes.push_back(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Failures divided by window length; 0.0 for an empty window.
    pub fn failure_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.outcomes.len() as f64
    }

    pub fn outcomes(&self) -> impl Iterator<Item = Outcome> + '_ {
        self.outcomes.iter().copied()
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }
}

/// A status change performed by one of the `CircuitState` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitStatus,
    pub to: CircuitStatus,
}

/// Admission decision for an incoming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit is Closed; the call runs with the full retry budget.
    Admitted,
    /// Circuit is Half-Open; the call is a probe issued in cycle `epoch`.
    Probe { epoch: u64 },
    /// Circuit is Open or the probe budget is spent.
    Rejected,
}

/// Read-only view of a circuit, served to health reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub identity: String,
    pub status: CircuitStatus,
    pub failure_ratio: f64,
    pub samples: usize,
    pub failures: usize,
    /// Wall-clock time of the last transition to Open, in ms since the epoch.
    pub opened_at_unix_ms: Option<u64>,
    pub half_open_probes_issued: u32,
}

/// Mutable circuit bookkeeping.
#[derive(Debug, Clone)]
pub struct CircuitState {
    status: CircuitStatus,
    window: RollingWindow,
    min_samples: usize,
    opened_at: Option<Instant>,
    opened_at_wall: Option<SystemTime>,
    half_open_probes_issued: u32,
    /// Incremented on every entry into Half-Open so that stale probe permits
    /// cannot release budget belonging to a later cycle.
    half_open_epoch: u64,
}

impl CircuitState {
    pub fn new(settings: WindowSettings) -> Self {
        Self {
            status: CircuitStatus::Closed,
            window: RollingWindow::new(settings.size),
            min_samples: settings.min_samples,
            opened_at: None,
            opened_at_wall: None,
            half_open_probes_issued: 0,
            half_open_epoch: 0,
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.status
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn half_open_probes_issued(&self) -> u32 {
        self.half_open_probes_issued
    }

    /// Decide whether a call may run. Performs the lazy Open → Half-Open
    /// transition and the atomic probe check-and-increment.
    pub fn admit(&mut self, policy: &CallPolicy, now: Instant) -> (Admission, Option<Transition>) {
        let mut transition = None;

        if self.status == CircuitStatus::Open {
            let elapsed = self
                .opened_at
                .map(|at| now.saturating_duration_since(at) >= policy.reset_timeout())
                .unwrap_or(true);
            if !elapsed {
                return (Admission::Rejected, None);
            }
            transition = Some(self.transition(CircuitStatus::HalfOpen, now));
        }

        match self.status {
            CircuitStatus::Closed => (Admission::Admitted, transition),
            CircuitStatus::HalfOpen => {
                if self.half_open_probes_issued < policy.half_open_probe_count() {
                    self.half_open_probes_issued += 1;
                    (Admission::Probe { epoch: self.half_open_epoch }, transition)
                } else {
                    (Admission::Rejected, transition)
                }
            }
            CircuitStatus::Open => (Admission::Rejected, transition),
        }
    }

    /// Record a successful call. A success while Half-Open closes the circuit
    /// and clears the window.
    pub fn record_success(&mut self, now: Instant) -> Option<Transition> {
        self.window.push(Outcome::Success);
        if self.status == CircuitStatus::HalfOpen {
            return Some(self.transition(CircuitStatus::Closed, now));
        }
        None
    }

    /// Record a failed attempt. `probe` carries the half-open epoch of a
    /// probe permit. A failed probe reopens a Half-Open circuit; a probe that
    /// outlived its cycle (a sibling already closed or reopened the circuit)
    /// is not recorded.
    pub fn record_failure(&mut self, probe: Option<u64>, now: Instant) -> Option<Transition> {
        match probe {
            None => {
                self.window.push(Outcome::Failure);
                None
            }
            Some(epoch)
                if self.status == CircuitStatus::HalfOpen && epoch == self.half_open_epoch =>
            {
                self.window.push(Outcome::Failure);
                Some(self.transition(CircuitStatus::Open, now))
            }
            Some(_) => None,
        }
    }

    /// Evaluate the rolling failure ratio once a caller has exhausted its
    /// retries; trips a Closed circuit when the ratio reaches the threshold.
    pub fn evaluate(&mut self, policy: &CallPolicy, now: Instant) -> Option<Transition> {
        if self.status != CircuitStatus::Closed || self.window.len() < self.min_samples {
            return None;
        }
        if self.window.failure_ratio() >= policy.failure_threshold_ratio() {
            return Some(self.transition(CircuitStatus::Open, now));
        }
        None
    }

    /// Give back a probe slot that ended without a verdict (cancelled,
    /// non-retryable, or dropped mid-flight).
    pub fn release_probe(&mut self, epoch: u64) {
        if self.status == CircuitStatus::HalfOpen
            && self.half_open_epoch == epoch
            && self.half_open_probes_issued > 0
        {
            self.half_open_probes_issued -= 1;
        }
    }

    pub fn snapshot(&self, identity: &str) -> CircuitSnapshot {
        CircuitSnapshot {
            identity: identity.to_string(),
            status: self.status,
            failure_ratio: self.window.failure_ratio(),
            samples: self.window.len(),
            failures: self.window.failures(),
            opened_at_unix_ms: self.opened_at_wall.map(|at| {
                at.duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64
            }),
            half_open_probes_issued: self.half_open_probes_issued,
        }
    }

    fn transition(&mut self, to: CircuitStatus, now: Instant) -> Transition {
        let from = self.status;
        self.status = to;
        self.half_open_probes_issued = 0;

        match to {
            CircuitStatus::Open => {
                self.opened_at = Some(now);
                self.opened_at_wall = Some(SystemTime::now());
            }
            CircuitStatus::HalfOpen => {
                self.half_open_epoch = self.half_open_epoch.wrapping_add(1);
            }
            CircuitStatus::Closed => {
                self.opened_at = None;
                self.opened_at_wall = None;
                self.window.clear();
            }
        }

        Transition { from, to }
    }
}
